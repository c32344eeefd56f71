use crate::{NodeGroupService, Result};
use async_trait::async_trait;
use nodefleet_common::{
    Cluster, Node, NodeGroup, NodeGroupDetails, NodeGroupState, NodeState, Plan, ServiceError,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

struct MockGroup {
    group: NodeGroup,
    // Materialized on first details read, then kept in sync with count.
    nodes: Option<Vec<Node>>,
    next_index: usize,
    settle_remaining: u32,
    never_converge: bool,
    details_error: Option<ServiceError>,
}

impl MockGroup {
    fn new(group: NodeGroup) -> Self {
        Self {
            group,
            nodes: None,
            next_index: 0,
            settle_remaining: 0,
            never_converge: false,
            details_error: None,
        }
    }

    fn spawn_node(&mut self, state: NodeState) -> Node {
        let i = self.next_index;
        self.next_index += 1;
        Node {
            uuid: format!("{}-{}", self.group.name, i),
            name: format!("{}-node-{}", self.group.name, i),
            state,
        }
    }

    fn materialize(&mut self) {
        if self.nodes.is_none() {
            let mut nodes = Vec::with_capacity(self.group.count);
            for _ in 0..self.group.count {
                nodes.push(self.spawn_node(NodeState::Running));
            }
            self.nodes = Some(nodes);
        }
    }

    fn resize_nodes(&mut self) {
        let Some(mut nodes) = self.nodes.take() else {
            return;
        };
        while nodes.len() < self.group.count {
            nodes.push(self.spawn_node(NodeState::Pending));
        }
        nodes.truncate(self.group.count);
        self.nodes = Some(nodes);
    }

    fn begin_transition(&mut self, state: NodeGroupState, settle_after: u32) {
        if settle_after == 0 && !self.never_converge {
            self.group.state = NodeGroupState::Running;
            self.settle_remaining = 0;
        } else {
            self.group.state = state;
            self.settle_remaining = settle_after;
        }
    }

    // One details poll: advance the transition and report the resulting state.
    fn poll(&mut self) {
        if self.group.state.is_stable() || self.never_converge {
            return;
        }
        if self.settle_remaining > 0 {
            self.settle_remaining -= 1;
            return;
        }
        self.group.state = NodeGroupState::Running;
        if let Some(nodes) = self.nodes.as_mut() {
            for n in nodes.iter_mut() {
                n.state = NodeState::Running;
            }
        }
    }
}

struct MockCluster {
    cluster: Cluster,
    groups: Vec<MockGroup>,
}

#[derive(Default)]
struct Inner {
    clusters: HashMap<Uuid, MockCluster>,
    plans: Vec<Plan>,
    settle_after: u32,
    latency: Option<Duration>,
    get_cluster_error: Option<ServiceError>,
    list_error: Option<ServiceError>,
    modify_error: Option<ServiceError>,
    delete_error: Option<ServiceError>,
    calls: HashMap<&'static str, usize>,
}

impl Inner {
    fn record(&mut self, op: &'static str) {
        *self.calls.entry(op).or_insert(0) += 1;
    }

    fn cluster_mut(&mut self, cluster_id: Uuid) -> Result<&mut MockCluster> {
        self.clusters
            .get_mut(&cluster_id)
            .ok_or_else(|| ServiceError::NotFound(format!("cluster {}", cluster_id)))
    }

    fn group_mut(&mut self, cluster_id: Uuid, name: &str) -> Result<&mut MockGroup> {
        self.cluster_mut(cluster_id)?
            .groups
            .iter_mut()
            .find(|g| g.group.name == name)
            .ok_or_else(|| ServiceError::NotFound(format!("node group {}/{}", cluster_id, name)))
    }
}

/// In-memory stand-in for the managed-Kubernetes API.
///
/// Groups start `running`. After a modify or node delete a group reports a
/// transitional state for `settle_after` detail polls, then `running` again.
#[derive(Default)]
pub struct MockNodeGroupService {
    inner: Mutex<Inner>,
}

impl MockNodeGroupService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(mut self, name: &str, max_nodes: usize) -> Self {
        self.inner.get_mut().plans.push(Plan {
            name: name.to_string(),
            max_nodes,
        });
        self
    }

    pub fn with_cluster(mut self, cluster_id: Uuid, plan: &str, groups: Vec<NodeGroup>) -> Self {
        self.inner.get_mut().clusters.insert(
            cluster_id,
            MockCluster {
                cluster: Cluster {
                    uuid: cluster_id,
                    name: format!("cluster-{}", cluster_id),
                    plan: plan.to_string(),
                },
                groups: groups.into_iter().map(MockGroup::new).collect(),
            },
        );
        self
    }

    /// Number of detail polls a group stays transitional after a mutation.
    pub fn with_settle_after(mut self, polls: u32) -> Self {
        self.inner.get_mut().settle_after = polls;
        self
    }

    /// Delay applied to every call, to exercise per-call timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.inner.get_mut().latency = Some(latency);
        self
    }

    /// Change the per-call delay after construction (`None` removes it).
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.inner.lock().await.latency = latency;
    }

    pub async fn append_node_group(&self, cluster_id: Uuid, group: NodeGroup) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.cluster_mut(cluster_id)?.groups.push(MockGroup::new(group));
        Ok(())
    }

    pub async fn remove_node_group(&self, cluster_id: Uuid, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.cluster_mut(cluster_id)?.groups.retain(|g| g.group.name != name);
        Ok(())
    }

    /// Out-of-band change of the remote count (someone else scaled the group).
    pub async fn set_remote_count(&self, cluster_id: Uuid, name: &str, count: usize) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let group = inner.group_mut(cluster_id, name)?;
        group.group.count = count;
        group.resize_nodes();
        Ok(())
    }

    pub async fn set_group_state(&self, cluster_id: Uuid, name: &str, state: NodeGroupState) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.group_mut(cluster_id, name)?.group.state = state;
        Ok(())
    }

    pub async fn set_never_converge(&self, cluster_id: Uuid, name: &str, never: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.group_mut(cluster_id, name)?.never_converge = never;
        Ok(())
    }

    pub async fn fail_details(&self, cluster_id: Uuid, name: &str, err: Option<ServiceError>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.group_mut(cluster_id, name)?.details_error = err;
        Ok(())
    }

    pub async fn fail_get_cluster(&self, err: Option<ServiceError>) {
        self.inner.lock().await.get_cluster_error = err;
    }

    pub async fn fail_list_node_groups(&self, err: Option<ServiceError>) {
        self.inner.lock().await.list_error = err;
    }

    pub async fn fail_modify(&self, err: Option<ServiceError>) {
        self.inner.lock().await.modify_error = err;
    }

    pub async fn fail_delete(&self, err: Option<ServiceError>) {
        self.inner.lock().await.delete_error = err;
    }

    pub async fn node_group(&self, cluster_id: Uuid, name: &str) -> Option<NodeGroup> {
        let mut inner = self.inner.lock().await;
        inner.group_mut(cluster_id, name).ok().map(|g| g.group.clone())
    }

    pub async fn calls(&self, op: &str) -> usize {
        self.inner.lock().await.calls.get(op).copied().unwrap_or(0)
    }

    async fn simulate_latency(&self) {
        let latency = self.inner.lock().await.latency;
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl NodeGroupService for MockNodeGroupService {
    async fn get_cluster(&self, cluster_id: Uuid) -> Result<Cluster> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().await;
        inner.record("get_cluster");
        if let Some(err) = inner.get_cluster_error.clone() {
            return Err(err);
        }
        Ok(inner.cluster_mut(cluster_id)?.cluster.clone())
    }

    async fn list_plans(&self) -> Result<Vec<Plan>> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().await;
        inner.record("list_plans");
        Ok(inner.plans.clone())
    }

    async fn list_node_groups(&self, cluster_id: Uuid) -> Result<Vec<NodeGroup>> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().await;
        inner.record("list_node_groups");
        if let Some(err) = inner.list_error.clone() {
            return Err(err);
        }
        Ok(inner
            .cluster_mut(cluster_id)?
            .groups
            .iter()
            .map(|g| g.group.clone())
            .collect())
    }

    async fn get_node_group_details(&self, cluster_id: Uuid, name: &str) -> Result<NodeGroupDetails> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().await;
        inner.record("get_node_group_details");
        let group = inner.group_mut(cluster_id, name)?;
        if let Some(err) = group.details_error.clone() {
            return Err(err);
        }
        group.materialize();
        group.poll();
        Ok(NodeGroupDetails {
            name: group.group.name.clone(),
            count: group.group.count,
            state: group.group.state.clone(),
            nodes: group.nodes.clone().unwrap_or_default(),
        })
    }

    async fn modify_node_group(&self, cluster_id: Uuid, name: &str, count: usize) -> Result<NodeGroup> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().await;
        inner.record("modify_node_group");
        if let Some(err) = inner.modify_error.clone() {
            return Err(err);
        }
        let settle_after = inner.settle_after;
        let group = inner.group_mut(cluster_id, name)?;
        let transition = if count >= group.group.count {
            NodeGroupState::ScalingUp
        } else {
            NodeGroupState::ScalingDown
        };
        group.group.count = count;
        group.resize_nodes();
        group.begin_transition(transition, settle_after);
        Ok(group.group.clone())
    }

    async fn delete_node(&self, cluster_id: Uuid, group_name: &str, node_name: &str) -> Result<()> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().await;
        inner.record("delete_node");
        if let Some(err) = inner.delete_error.clone() {
            return Err(err);
        }
        let settle_after = inner.settle_after;
        let group = inner.group_mut(cluster_id, group_name)?;
        group.materialize();
        let nodes = group.nodes.get_or_insert_with(Vec::new);
        let Some(pos) = nodes.iter().position(|n| n.name == node_name) else {
            return Err(ServiceError::NotFound(format!(
                "node {} in node group {}",
                node_name, group_name
            )));
        };
        nodes.remove(pos);
        group.group.count = nodes.len();
        group.begin_transition(NodeGroupState::ScalingDown, settle_after);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str, count: usize) -> NodeGroup {
        NodeGroup {
            name: name.to_string(),
            count,
            state: NodeGroupState::Running,
        }
    }

    #[tokio::test]
    async fn details_materialize_running_nodes() {
        let id = Uuid::new_v4();
        let svc = MockNodeGroupService::new().with_cluster(id, "dev", vec![group("group1", 2)]);
        let d = svc.get_node_group_details(id, "group1").await.unwrap();
        assert_eq!(d.count, 2);
        let names: Vec<_> = d.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["group1-node-0", "group1-node-1"]);
        assert_eq!(d.nodes[1].uuid, "group1-1");
        assert!(d.nodes.iter().all(|n| n.state == NodeState::Running));
    }

    #[tokio::test]
    async fn modify_settles_after_configured_polls() {
        let id = Uuid::new_v4();
        let svc = MockNodeGroupService::new()
            .with_cluster(id, "dev", vec![group("group1", 1)])
            .with_settle_after(2);
        let g = svc.modify_node_group(id, "group1", 3).await.unwrap();
        assert_eq!(g.state, NodeGroupState::ScalingUp);
        assert_eq!(g.count, 3);

        let d = svc.get_node_group_details(id, "group1").await.unwrap();
        assert_eq!(d.state, NodeGroupState::ScalingUp);
        let d = svc.get_node_group_details(id, "group1").await.unwrap();
        assert_eq!(d.state, NodeGroupState::ScalingUp);
        let d = svc.get_node_group_details(id, "group1").await.unwrap();
        assert_eq!(d.state, NodeGroupState::Running);
        assert_eq!(d.nodes.len(), 3);
        assert!(d.nodes.iter().all(|n| n.state == NodeState::Running));
    }

    #[tokio::test]
    async fn delete_missing_node_is_not_found() {
        let id = Uuid::new_v4();
        let svc = MockNodeGroupService::new().with_cluster(id, "dev", vec![group("group1", 2)]);
        let err = svc.delete_node(id, "group1", "nope").await.unwrap_err();
        assert!(err.is_not_found());

        svc.delete_node(id, "group1", "group1-node-1").await.unwrap();
        let d = svc.get_node_group_details(id, "group1").await.unwrap();
        assert_eq!(d.count, 1);
        assert_eq!(d.nodes[0].name, "group1-node-0");
        assert_eq!(svc.calls("delete_node").await, 2);
    }

    #[tokio::test]
    async fn unknown_cluster_is_not_found() {
        let svc = MockNodeGroupService::new();
        let err = svc.get_cluster(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
