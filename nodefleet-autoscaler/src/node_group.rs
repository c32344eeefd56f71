use nodefleet_common::{AutoscalerError, Instance, NodeGroupDetails};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bounds::GroupBounds;
use crate::context::{call_with_timeout, ServiceContext};

/// What the remote must report before a mutation counts as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Convergence {
    /// Stable state only.
    Settled,
    /// Stable and count strictly above the pre-operation size.
    Above(usize),
    /// Stable and count strictly below the pre-operation size.
    Below(usize),
}

impl Convergence {
    fn towards(before: usize, target: usize) -> Self {
        if target > before {
            Convergence::Above(before)
        } else {
            Convergence::Below(before)
        }
    }

    fn is_met(&self, details: &NodeGroupDetails) -> bool {
        if !details.state.is_stable() {
            return false;
        }
        match *self {
            Convergence::Settled => true,
            Convergence::Above(before) => details.count > before,
            Convergence::Below(before) => details.count < before,
        }
    }
}

#[derive(Debug)]
struct Observed {
    size: usize,
    nodes: Vec<Instance>,
}

/// Serializable view of a group handle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeGroupStatus {
    pub id: String,
    pub name: String,
    pub min_size: usize,
    pub max_size: usize,
    pub target_size: usize,
    pub nodes: Vec<Instance>,
}

/// One remote node group: cached size, bounds and member instances, plus the
/// scale operations that mutate it.
///
/// `observed` is only held for short reads/writes, never across a remote call.
/// `op_lock` serializes scale and delete operations for the whole mutation +
/// convergence wait.
pub struct NodeGroupRuntime {
    ctx: ServiceContext,
    cluster_id: Uuid,
    name: String,
    min_size: usize,
    max_size: usize,
    observed: RwLock<Observed>,
    op_lock: Mutex<()>,
}

impl std::fmt::Debug for NodeGroupRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeGroupRuntime")
            .field("cluster_id", &self.cluster_id)
            .field("name", &self.name)
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl NodeGroupRuntime {
    pub fn new(
        ctx: ServiceContext,
        cluster_id: Uuid,
        name: impl Into<String>,
        size: usize,
        bounds: GroupBounds,
        nodes: Vec<Instance>,
    ) -> Self {
        Self {
            ctx,
            cluster_id,
            name: name.into(),
            min_size: bounds.min_size,
            max_size: bounds.max_size,
            observed: RwLock::new(Observed { size, nodes }),
            op_lock: Mutex::new(()),
        }
    }

    /// `<cluster-uuid>/<group-name>`
    pub fn id(&self) -> String {
        format!("{}/{}", self.cluster_id, self.name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cluster_id(&self) -> Uuid {
        self.cluster_id
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Last confirmed size. Does not wait for an in-flight scale.
    pub async fn target_size(&self) -> usize {
        self.observed.read().await.size
    }

    pub async fn nodes(&self) -> Vec<Instance> {
        self.observed.read().await.nodes.clone()
    }

    pub fn exists(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn autoprovisioned(&self) -> bool {
        false
    }

    pub fn debug(&self) -> String {
        format!(
            "Node group ID: {} (min:{} max:{})",
            self.id(),
            self.min_size,
            self.max_size
        )
    }

    pub async fn status(&self) -> NodeGroupStatus {
        let observed = self.observed.read().await;
        NodeGroupStatus {
            id: self.id(),
            name: self.name.clone(),
            min_size: self.min_size,
            max_size: self.max_size,
            target_size: observed.size,
            nodes: observed.nodes.clone(),
        }
    }

    /// Grow the group by `delta` nodes and wait for the remote to converge.
    pub async fn increase_size(&self, delta: i64) -> Result<(), AutoscalerError> {
        if delta <= 0 {
            return Err(self.invalid_delta(delta, "size increase must be positive"));
        }

        let _op = self.op_lock.lock().await;
        let current = self.target_size().await;
        let target = (current as i64).saturating_add(delta);
        if target > self.max_size as i64 {
            return Err(self.out_of_bounds(current, target));
        }

        self.scale_to(current, target as usize).await
    }

    /// Shrink the desired size by `delta` (negative) without naming nodes.
    ///
    /// Only meant to retract capacity that has not been fulfilled yet.
    pub async fn decrease_target_size(&self, delta: i64) -> Result<(), AutoscalerError> {
        if delta >= 0 {
            return Err(self.invalid_delta(delta, "size decrease must be negative"));
        }

        let _op = self.op_lock.lock().await;
        let current = self.target_size().await;
        let target = (current as i64).saturating_add(delta);
        if target < self.min_size as i64 {
            return Err(self.out_of_bounds(current, target));
        }

        self.scale_to(current, target as usize).await
    }

    /// Delete the named nodes one by one, then wait for the group to settle.
    ///
    /// A node the remote no longer knows is skipped. Any other failure stops the
    /// loop and is returned; nodes deleted before it stay deleted.
    ///
    /// The shrink is measured against the remote count read just before the
    /// deletes, not the cached size, which may be stale.
    pub async fn delete_nodes<S: AsRef<str>>(&self, names: &[S]) -> Result<(), AutoscalerError> {
        let _op = self.op_lock.lock().await;
        let before = self.fetch_details().await?.count;
        let timeouts = self.ctx.timeouts;

        let mut deleted = 0usize;
        for node in names {
            let node = node.as_ref();
            info!(group = %self.id(), node, "deleting node");
            let res = call_with_timeout(
                timeouts.delete_node,
                self.ctx.service.delete_node(self.cluster_id, &self.name, node),
            )
            .await;
            match res {
                Ok(()) => deleted += 1,
                Err(e) if e.is_not_found() => {
                    warn!(group = %self.id(), node, "node already gone, skipping: {}", e);
                }
                Err(e) => {
                    return Err(AutoscalerError::from_service(
                        format!("delete node {} from node group {}", node, self.id()),
                        e,
                    ));
                }
            }
        }

        let expect = if deleted == 0 {
            Convergence::Settled
        } else {
            Convergence::Below(before)
        };
        let details = self.wait_converged(expect).await?;
        self.apply(details).await;
        Ok(())
    }

    // Caller holds `op_lock`.
    async fn scale_to(&self, current: usize, target: usize) -> Result<(), AutoscalerError> {
        info!(group = %self.id(), size = current, target, "scaling node group");

        call_with_timeout(
            self.ctx.timeouts.modify_node_group,
            self.ctx
                .service
                .modify_node_group(self.cluster_id, &self.name, target),
        )
        .await
        .map_err(|source| AutoscalerError::ScaleRequestFailed {
            group: self.id(),
            target,
            source,
        })?;

        let details = self.wait_converged(Convergence::towards(current, target)).await?;
        self.apply(details).await;
        Ok(())
    }

    async fn wait_converged(&self, expect: Convergence) -> Result<NodeGroupDetails, AutoscalerError> {
        let timeouts = self.ctx.timeouts;
        let clock = &self.ctx.clock;
        let deadline = clock.now() + timeouts.wait_node_group_state;
        let mut polls: u32 = 0;

        while clock.now() < deadline {
            polls += 1;
            let details = self.fetch_details().await?;

            if expect.is_met(&details) {
                debug!(group = %self.id(), poll = polls, count = details.count, "node group converged");
                return Ok(details);
            }
            debug!(
                group = %self.id(),
                poll = polls,
                state = details.state.as_str(),
                count = details.count,
                "waiting for node group to converge"
            );
            clock.sleep(timeouts.poll_interval).await;
        }

        warn!(group = %self.id(), polls, "node group did not converge in {:?}", timeouts.wait_node_group_state);
        Err(AutoscalerError::ConvergenceTimeout {
            group: self.id(),
            polls,
        })
    }

    async fn fetch_details(&self) -> Result<NodeGroupDetails, AutoscalerError> {
        call_with_timeout(
            self.ctx.timeouts.get_request,
            self.ctx
                .service
                .get_node_group_details(self.cluster_id, &self.name),
        )
        .await
        .map_err(|e| AutoscalerError::from_service(format!("fetch node group {}", self.id()), e))
    }

    async fn apply(&self, details: NodeGroupDetails) {
        let nodes = details.instances();
        let mut observed = self.observed.write().await;
        info!(group = %self.id(), size = details.count, "node group size confirmed (was {})", observed.size);
        observed.size = details.count;
        observed.nodes = nodes;
    }

    fn invalid_delta(&self, delta: i64, reason: &'static str) -> AutoscalerError {
        AutoscalerError::InvalidArgument {
            group: self.id(),
            delta,
            reason,
        }
    }

    fn out_of_bounds(&self, current: usize, target: i64) -> AutoscalerError {
        AutoscalerError::BoundsExceeded {
            group: self.id(),
            current,
            target,
            min: self.min_size,
            max: self.max_size,
        }
    }
}
