use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use nodefleet_common::ServiceError;
use nodefleet_providers::NodeGroupService;

use crate::clock::Clock;

/// Deadlines for remote calls and for the convergence wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Manager construction (plan lookup) in the binary.
    pub provider_init: Duration,
    pub get_request: Duration,
    pub modify_node_group: Duration,
    pub delete_node: Duration,
    /// Overall budget for a group to converge after a mutation.
    pub wait_node_group_state: Duration,
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            provider_init: Duration::from_secs(15),
            get_request: Duration::from_secs(10),
            modify_node_group: Duration::from_secs(20),
            delete_node: Duration::from_secs(20),
            wait_node_group_state: Duration::from_secs(20 * 60),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Everything a runtime needs to talk to the remote side.
#[derive(Clone)]
pub struct ServiceContext {
    pub service: Arc<dyn NodeGroupService>,
    pub clock: Arc<dyn Clock>,
    pub timeouts: Timeouts,
}

impl ServiceContext {
    pub fn new(service: Arc<dyn NodeGroupService>, clock: Arc<dyn Clock>, timeouts: Timeouts) -> Self {
        Self {
            service,
            clock,
            timeouts,
        }
    }
}

/// Run one remote call under its own deadline.
pub async fn call_with_timeout<T, F>(limit: Duration, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(res) => res,
        Err(_) => Err(ServiceError::Timeout(limit)),
    }
}
