use crate::{NodeGroupService, Result};
use async_trait::async_trait;
use nodefleet_common::{Cluster, NodeGroup, NodeGroupDetails, Plan, ServiceError};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct UpCloudService {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl UpCloudService {
    pub fn new(
        base_url: &str,
        username: String,
        password: String,
        user_agent: &str,
    ) -> Result<Self> {
        // Default reqwest client has no overall timeout. If the API stalls, a refresh can hang forever.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .user_agent(user_agent)
            .build()
            .map_err(|e| ServiceError::Transport(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            username: username.trim().to_string(),
            password,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/kubernetes{}", self.base_url, path);
        debug!("[UpCloud API] {} {}", method, url);
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let resp = req
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let url = resp.url().to_string();
        let body = resp.text().await.unwrap_or_default();
        warn!("[UpCloud API] {} failed: status={} body={}", url, status.as_u16(), body);
        Err(match status {
            StatusCode::NOT_FOUND => ServiceError::NotFound(body),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => ServiceError::PermissionDenied(body),
            _ => ServiceError::Api {
                status: status.as_u16(),
                body,
            },
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.send(self.request(Method::GET, path)).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ServiceError::Transport(format!("invalid response for {}: {}", path, e)))
    }
}

#[async_trait]
impl NodeGroupService for UpCloudService {
    async fn get_cluster(&self, cluster_id: Uuid) -> Result<Cluster> {
        self.get_json(&format!("/{}", cluster_id)).await
    }

    async fn list_plans(&self) -> Result<Vec<Plan>> {
        self.get_json("/plans").await
    }

    async fn list_node_groups(&self, cluster_id: Uuid) -> Result<Vec<NodeGroup>> {
        self.get_json(&format!("/{}/node-groups", cluster_id)).await
    }

    async fn get_node_group_details(&self, cluster_id: Uuid, name: &str) -> Result<NodeGroupDetails> {
        self.get_json(&format!("/{}/node-groups/{}/details", cluster_id, name))
            .await
    }

    async fn modify_node_group(&self, cluster_id: Uuid, name: &str, count: usize) -> Result<NodeGroup> {
        let req = self
            .request(Method::PATCH, &format!("/{}/node-groups/{}", cluster_id, name))
            .json(&json!({ "count": count }));
        let resp = self.send(req).await?;
        let group = resp
            .json::<NodeGroup>()
            .await
            .map_err(|e| ServiceError::Transport(format!("invalid modify response: {}", e)))?;
        debug!(
            "[UpCloud API] node group {}/{} accepted count={} state={}",
            cluster_id,
            name,
            group.count,
            group.state.as_str()
        );
        Ok(group)
    }

    async fn delete_node(&self, cluster_id: Uuid, group_name: &str, node_name: &str) -> Result<()> {
        let path = format!("/{}/node-groups/{}/{}", cluster_id, group_name, node_name);
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }
}
