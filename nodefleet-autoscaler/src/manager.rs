use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nodefleet_common::AutoscalerError;
use nodefleet_providers::NodeGroupService;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bounds::{self, GroupBounds};
use crate::clock::Clock;
use crate::config::ManagerConfig;
use crate::context::{call_with_timeout, ServiceContext};
use crate::node_group::NodeGroupRuntime;

/// Group list published by the last successful refresh.
#[derive(Debug, Default)]
pub struct FleetSnapshot {
    pub groups: Vec<Arc<NodeGroupRuntime>>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// In-memory cache of a cluster's node groups, rebuilt from the remote on `refresh`.
pub struct FleetManager {
    ctx: ServiceContext,
    cluster_id: Uuid,
    default_min_size: usize,
    effective_max: usize,
    overrides: HashMap<String, GroupBounds>,
    snapshot: RwLock<Arc<FleetSnapshot>>,
    refresh_lock: Mutex<()>,
}

impl FleetManager {
    /// Validate the cluster, resolve plan capacity and parse the override specs.
    ///
    /// The group list starts empty until the first `refresh`.
    pub async fn new(
        service: Arc<dyn NodeGroupService>,
        config: &ManagerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AutoscalerError> {
        let cluster_id = Uuid::parse_str(config.cluster_id.trim()).map_err(|e| {
            AutoscalerError::configuration(format!(
                "invalid cluster id '{}': {}",
                config.cluster_id, e
            ))
        })?;

        let effective_max = bounds::resolve_effective_max(
            service.as_ref(),
            cluster_id,
            config.max_nodes_total,
            &config.timeouts,
        )
        .await?;
        let overrides = bounds::resolve_group_overrides(
            config.node_group_specs.as_slice(),
            config.scale_to_zero,
            effective_max,
        )?;

        info!(
            cluster = %cluster_id,
            effective_max,
            overrides = overrides.len(),
            scale_to_zero = config.scale_to_zero,
            "fleet manager ready"
        );

        Ok(Self {
            ctx: ServiceContext::new(service, clock, config.timeouts),
            cluster_id,
            default_min_size: bounds::default_min_size(config.scale_to_zero),
            effective_max,
            overrides,
            snapshot: RwLock::new(Arc::new(FleetSnapshot::default())),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn cluster_id(&self) -> Uuid {
        self.cluster_id
    }

    pub fn effective_max(&self) -> usize {
        self.effective_max
    }

    pub fn overrides(&self) -> &HashMap<String, GroupBounds> {
        &self.overrides
    }

    /// Bounds a group named `name` gets on the next refresh.
    pub fn bounds_for(&self, name: &str) -> GroupBounds {
        self.overrides.get(name).copied().unwrap_or(GroupBounds {
            min_size: self.default_min_size,
            max_size: self.effective_max,
        })
    }

    pub async fn snapshot(&self) -> Arc<FleetSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Cached group handles. Never touches the network.
    pub async fn list_groups(&self) -> Vec<Arc<NodeGroupRuntime>> {
        self.snapshot().await.groups.clone()
    }

    pub async fn group(&self, name: &str) -> Option<Arc<NodeGroupRuntime>> {
        self.snapshot()
            .await
            .groups
            .iter()
            .find(|g| g.name() == name)
            .cloned()
    }

    /// Rebuild the group list from the remote and publish it.
    ///
    /// Groups whose details cannot be fetched are left out of this cycle. If the
    /// listing itself fails the previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<(), AutoscalerError> {
        let _guard = self.refresh_lock.lock().await;
        let timeouts = self.ctx.timeouts;

        let remote = call_with_timeout(
            timeouts.get_request,
            self.ctx.service.list_node_groups(self.cluster_id),
        )
        .await
        .map_err(|e| {
            AutoscalerError::from_service(
                format!("list node groups of cluster {}", self.cluster_id),
                e,
            )
        })?;

        let mut groups = Vec::with_capacity(remote.len());
        for group in remote {
            let details = match call_with_timeout(
                timeouts.get_request,
                self.ctx
                    .service
                    .get_node_group_details(self.cluster_id, &group.name),
            )
            .await
            {
                Ok(details) => details,
                Err(e) => {
                    error!(
                        cluster = %self.cluster_id,
                        group = %group.name,
                        "failed to get node group details, skipping: {}",
                        e
                    );
                    continue;
                }
            };

            if details.count != group.count {
                warn!(
                    cluster = %self.cluster_id,
                    group = %group.name,
                    "node group count changed during refresh: listed={} details={}",
                    group.count,
                    details.count
                );
            }

            let bounds = self.bounds_for(&group.name);
            let runtime = NodeGroupRuntime::new(
                self.ctx.clone(),
                self.cluster_id,
                group.name,
                details.count,
                bounds,
                details.instances(),
            );
            info!("caching {}", runtime.debug());
            groups.push(Arc::new(runtime));
        }

        let count = groups.len();
        *self.snapshot.write().await = Arc::new(FleetSnapshot {
            groups,
            refreshed_at: Some(Utc::now()),
        });
        info!(cluster = %self.cluster_id, "refreshed {} node group(s)", count);
        Ok(())
    }
}
