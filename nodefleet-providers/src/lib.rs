use async_trait::async_trait;
use uuid::Uuid;

pub use nodefleet_common::{
    Cluster, Node, NodeGroup, NodeGroupDetails, NodeGroupState, NodeState, Plan, ServiceError,
};

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Public UpCloud API root; the transport appends `/kubernetes/...`.
pub const DEFAULT_UPCLOUD_API_URL: &str = "https://api.upcloud.com/1.3";

/// Remote managed-Kubernetes API as seen by the autoscaler.
///
/// Implementations are injected into the fleet manager; the core never reaches for a
/// global client. Errors must tell `NotFound` and `PermissionDenied` apart from
/// generic failures so callers can classify them.
#[async_trait]
pub trait NodeGroupService: Send + Sync {
    async fn get_cluster(&self, cluster_id: Uuid) -> Result<Cluster>;

    async fn list_plans(&self) -> Result<Vec<Plan>>;

    async fn list_node_groups(&self, cluster_id: Uuid) -> Result<Vec<NodeGroup>>;

    /// Group summary plus its member nodes.
    async fn get_node_group_details(&self, cluster_id: Uuid, name: &str) -> Result<NodeGroupDetails>;

    /// Set the desired node count. Returns the group as accepted by the remote.
    async fn modify_node_group(&self, cluster_id: Uuid, name: &str, count: usize) -> Result<NodeGroup>;

    async fn delete_node(&self, cluster_id: Uuid, group_name: &str, node_name: &str) -> Result<()>;
}

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "upcloud")]
pub mod upcloud;
