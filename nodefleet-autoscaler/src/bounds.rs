use std::collections::HashMap;

use nodefleet_common::{AutoscalerError, NodeGroupSpec, Plan};
use nodefleet_providers::NodeGroupService;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::{call_with_timeout, Timeouts};

/// Explicit min/max for one node group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupBounds {
    pub min_size: usize,
    pub max_size: usize,
}

/// Global minimum applied to groups without an override.
pub fn default_min_size(scale_to_zero: bool) -> usize {
    if scale_to_zero {
        0
    } else {
        1
    }
}

/// Resolve the maximum node count the cluster may reach.
///
/// `requested_max == 0` means "whatever the plan allows".
pub async fn resolve_effective_max(
    service: &dyn NodeGroupService,
    cluster_id: Uuid,
    requested_max: usize,
    timeouts: &Timeouts,
) -> Result<usize, AutoscalerError> {
    let cluster = call_with_timeout(timeouts.get_request, service.get_cluster(cluster_id))
        .await
        .map_err(|e| AutoscalerError::from_service(format!("get cluster {}", cluster_id), e))?;

    let plan = find_plan(service, &cluster.plan, timeouts).await?;
    debug!(cluster = %cluster_id, plan = %plan.name, plan_max = plan.max_nodes, requested_max, "resolved cluster plan");

    if requested_max == 0 {
        info!(cluster = %cluster_id, "using plan '{}' maximum of {} nodes", plan.name, plan.max_nodes);
        return Ok(plan.max_nodes);
    }
    if requested_max > plan.max_nodes {
        return Err(AutoscalerError::configuration(format!(
            "requested maximum exceeds plan capacity: {} > {} (plan '{}')",
            requested_max, plan.max_nodes, plan.name
        )));
    }
    Ok(requested_max)
}

async fn find_plan(
    service: &dyn NodeGroupService,
    name: &str,
    timeouts: &Timeouts,
) -> Result<Plan, AutoscalerError> {
    let plans = call_with_timeout(timeouts.get_request, service.list_plans())
        .await
        .map_err(|e| AutoscalerError::from_service("list cluster plans", e))?;

    plans
        .into_iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| AutoscalerError::configuration(format!("cluster plan '{}' not found", name)))
}

/// Parse and validate override specs against the effective maximum.
///
/// A later spec for the same name replaces an earlier one.
pub fn resolve_group_overrides<S: AsRef<str>>(
    specs: &[S],
    scale_to_zero: bool,
    effective_max: usize,
) -> Result<HashMap<String, GroupBounds>, AutoscalerError> {
    let mut overrides = HashMap::with_capacity(specs.len());
    for raw in specs {
        let raw = raw.as_ref();
        let spec = NodeGroupSpec::parse(raw, scale_to_zero)?;
        if spec.max_size > effective_max {
            return Err(AutoscalerError::configuration(format!(
                "node group spec '{}': max size {} exceeds cluster maximum {}",
                raw, spec.max_size, effective_max
            )));
        }
        info!(
            "node group '{}' bounds set to min={} max={}",
            spec.name, spec.min_size, spec.max_size
        );
        overrides.insert(
            spec.name,
            GroupBounds {
                min_size: spec.min_size,
                max_size: spec.max_size,
            },
        );
    }
    Ok(overrides)
}
