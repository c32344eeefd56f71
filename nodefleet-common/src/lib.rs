use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod discovery;
pub mod error;

pub use discovery::NodeGroupSpec;
pub use error::{AutoscalerError, ServiceError};

/// Prefix of the provider ID Kubernetes nodes carry for managed-cluster workers.
pub const PROVIDER_ID_PREFIX: &str = "upcloud:////";

// --- Remote states ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum NodeGroupState {
    Running,
    Pending,
    ScalingUp,
    ScalingDown,
    Failed,
    Unknown,
    Other(String), // Unrecognized value, preserved verbatim
}

impl NodeGroupState {
    pub fn as_str(&self) -> &str {
        match self {
            NodeGroupState::Running => "running",
            NodeGroupState::Pending => "pending",
            NodeGroupState::ScalingUp => "scaling-up",
            NodeGroupState::ScalingDown => "scaling-down",
            NodeGroupState::Failed => "failed",
            NodeGroupState::Unknown => "unknown",
            NodeGroupState::Other(s) => s.as_str(),
        }
    }

    /// Only `running` means the group finished transitioning.
    pub fn is_stable(&self) -> bool {
        matches!(self, NodeGroupState::Running)
    }
}

impl From<String> for NodeGroupState {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "running" => NodeGroupState::Running,
            "pending" => NodeGroupState::Pending,
            "scaling-up" => NodeGroupState::ScalingUp,
            "scaling-down" => NodeGroupState::ScalingDown,
            "failed" => NodeGroupState::Failed,
            "unknown" | "" => NodeGroupState::Unknown,
            _ => NodeGroupState::Other(s),
        }
    }
}

impl From<NodeGroupState> for String {
    fn from(s: NodeGroupState) -> Self {
        s.as_str().to_string()
    }
}

impl Default for NodeGroupState {
    fn default() -> Self {
        NodeGroupState::Unknown
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum NodeState {
    Running,
    Pending,
    Terminating,
    Failed,
    Unknown,
    Other(String),
}

impl NodeState {
    pub fn as_str(&self) -> &str {
        match self {
            NodeState::Running => "running",
            NodeState::Pending => "pending",
            NodeState::Terminating => "terminating",
            NodeState::Failed => "failed",
            NodeState::Unknown => "unknown",
            NodeState::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for NodeState {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "running" => NodeState::Running,
            "pending" => NodeState::Pending,
            "terminating" => NodeState::Terminating,
            "failed" => NodeState::Failed,
            "unknown" | "" => NodeState::Unknown,
            _ => NodeState::Other(s),
        }
    }
}

impl From<NodeState> for String {
    fn from(s: NodeState) -> Self {
        s.as_str().to_string()
    }
}

impl Default for NodeState {
    fn default() -> Self {
        NodeState::Unknown
    }
}

// --- Remote entities ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Cluster {
    pub uuid: Uuid,
    #[serde(default)]
    pub name: String,
    pub plan: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Plan {
    pub name: String,
    pub max_nodes: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NodeGroup {
    pub name: String,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub state: NodeGroupState,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Node {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub state: NodeState,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NodeGroupDetails {
    pub name: String,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub state: NodeGroupState,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl NodeGroupDetails {
    /// Instance snapshot of the group's members.
    pub fn instances(&self) -> Vec<Instance> {
        self.nodes.iter().map(Instance::from_node).collect()
    }
}

// --- Normalized instances ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "state", content = "error_code", rename_all = "lowercase")]
pub enum InstanceStatus {
    Creating,
    Running,
    Deleting,
    Error(String),
}

impl From<&NodeState> for InstanceStatus {
    fn from(state: &NodeState) -> Self {
        match state {
            NodeState::Running => InstanceStatus::Running,
            NodeState::Pending => InstanceStatus::Creating,
            NodeState::Terminating => InstanceStatus::Deleting,
            other => InstanceStatus::Error(other.as_str().to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    pub status: InstanceStatus,
}

impl Instance {
    pub fn from_node(node: &Node) -> Self {
        Self {
            id: format!("{}{}", PROVIDER_ID_PREFIX, node.uuid),
            status: InstanceStatus::from(&node.state),
        }
    }
}
