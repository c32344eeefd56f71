use std::sync::Arc;

use nodefleet_common::AutoscalerError;
use nodefleet_providers::NodeGroupService;

use crate::config::AutoscalerConfig;

pub struct ProviderManager;

impl ProviderManager {
    /// Build the node group service selected by `NODEFLEET_PROVIDER`.
    pub fn get_service(config: &AutoscalerConfig) -> Result<Arc<dyn NodeGroupService>, AutoscalerError> {
        match config.provider.as_str() {
            #[cfg(feature = "provider-upcloud")]
            "upcloud" => {
                use nodefleet_providers::upcloud::UpCloudService;

                let creds = config.credentials.clone().ok_or_else(|| {
                    AutoscalerError::configuration("upcloud provider requires credentials")
                })?;
                let service = UpCloudService::new(
                    &config.api_url,
                    creds.username,
                    creds.password,
                    &config.user_agent,
                )
                .map_err(|e| AutoscalerError::from_service("build upcloud client", e))?;
                Ok(Arc::new(service))
            }
            #[cfg(any(feature = "provider-mock", test))]
            "mock" => Ok(Arc::new(demo_service(&config.manager.cluster_id)?)),
            other => Err(AutoscalerError::configuration(format!(
                "provider '{}' is not compiled into this build",
                other
            ))),
        }
    }
}

/// In-memory cluster for dry runs: plan `development` (10 nodes), one group `default` of 1.
#[cfg(any(feature = "provider-mock", test))]
fn demo_service(
    cluster_id: &str,
) -> Result<nodefleet_providers::mock::MockNodeGroupService, AutoscalerError> {
    use nodefleet_providers::mock::MockNodeGroupService;
    use nodefleet_providers::{NodeGroup, NodeGroupState};

    let cluster_id = uuid::Uuid::parse_str(cluster_id.trim()).map_err(|e| {
        AutoscalerError::configuration(format!("invalid cluster id '{}': {}", cluster_id, e))
    })?;
    Ok(MockNodeGroupService::new()
        .with_plan("development", 10)
        .with_cluster(
            cluster_id,
            "development",
            vec![NodeGroup {
                name: "default".to_string(),
                count: 1,
                state: NodeGroupState::Running,
            }],
        ))
}
