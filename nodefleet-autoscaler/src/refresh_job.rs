use std::sync::Arc;
use std::time::Duration;

use nodefleet_common::AutoscalerError;
use tracing::{error, info, warn};

use crate::manager::FleetManager;

/// job-refresh: re-derives the node group list from the remote every `every`.
/// Errors are logged; the next tick retries.
pub async fn run(manager: Arc<FleetManager>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    info!("🔄 job-refresh started (cluster {}, every {:?})", manager.cluster_id(), every);

    loop {
        interval.tick().await;

        match refresh_once(&manager).await {
            Ok(count) => info!("🔄 job-refresh: {} node group(s) cached", count),
            Err(e) if e.is_transient() => warn!("⚠️ job-refresh transient error: {}", e),
            Err(e) => error!("❌ job-refresh error: {}", e),
        }
    }
}

/// One refresh cycle. Returns the size of the published group list.
pub async fn refresh_once(manager: &FleetManager) -> Result<usize, AutoscalerError> {
    manager.refresh().await?;
    Ok(manager.list_groups().await.len())
}
