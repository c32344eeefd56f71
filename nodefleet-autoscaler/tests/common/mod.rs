// Common test fixtures: an in-memory cluster behind the mock service and a manual clock.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use nodefleet_autoscaler::{FleetManager, ManagerConfig, ManualClock, NodeGroupRuntime, Timeouts};
use nodefleet_providers::mock::MockNodeGroupService;
use nodefleet_providers::{NodeGroup, NodeGroupService, NodeGroupState};
use uuid::Uuid;

pub const PLAN_MAX: usize = 20;

pub fn group(name: &str, count: usize) -> NodeGroup {
    NodeGroup {
        name: name.to_string(),
        count,
        state: NodeGroupState::Running,
    }
}

/// Convergence budget of 10s polled every 2s: five polls before giving up.
pub fn test_timeouts() -> Timeouts {
    Timeouts {
        provider_init: Duration::from_secs(15),
        get_request: Duration::from_secs(5),
        modify_node_group: Duration::from_secs(5),
        delete_node: Duration::from_secs(5),
        wait_node_group_state: Duration::from_secs(10),
        poll_interval: Duration::from_secs(2),
    }
}

/// Cluster on plan "Dev" (max 20) with `group1` of 2 nodes and `group2` of 3.
pub fn default_service(cluster_id: Uuid) -> MockNodeGroupService {
    MockNodeGroupService::new()
        .with_plan("dev", PLAN_MAX)
        .with_plan("production", 100)
        .with_cluster(cluster_id, "Dev", vec![group("group1", 2), group("group2", 3)])
}

pub struct Fleet {
    pub cluster_id: Uuid,
    pub service: Arc<MockNodeGroupService>,
    pub clock: Arc<ManualClock>,
    pub config: ManagerConfig,
}

impl Fleet {
    pub fn new() -> Self {
        let cluster_id = Uuid::new_v4();
        Self::with_service(cluster_id, default_service(cluster_id))
    }

    pub fn with_service(cluster_id: Uuid, service: MockNodeGroupService) -> Self {
        let mut config = ManagerConfig::new(cluster_id.to_string());
        config.timeouts = test_timeouts();
        Self {
            cluster_id,
            service: Arc::new(service),
            clock: Arc::new(ManualClock::new()),
            config,
        }
    }

    pub fn dyn_service(&self) -> Arc<dyn NodeGroupService> {
        self.service.clone()
    }

    pub async fn manager(&self) -> FleetManager {
        FleetManager::new(self.dyn_service(), &self.config, self.clock.clone())
            .await
            .expect("fleet manager should build")
    }

    /// Manager after one successful refresh.
    pub async fn refreshed_manager(&self) -> FleetManager {
        let manager = self.manager().await;
        manager.refresh().await.expect("refresh should succeed");
        manager
    }

    pub async fn group(&self, manager: &FleetManager, name: &str) -> Arc<NodeGroupRuntime> {
        manager
            .group(name)
            .await
            .unwrap_or_else(|| panic!("node group {} should be cached", name))
    }

    pub async fn remote_count(&self, name: &str) -> usize {
        self.service
            .node_group(self.cluster_id, name)
            .await
            .map(|g| g.count)
            .unwrap_or_default()
    }
}
