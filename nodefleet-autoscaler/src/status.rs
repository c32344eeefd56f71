use std::sync::Arc;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::manager::FleetManager;
use crate::node_group::NodeGroupStatus;

#[derive(Debug, Serialize)]
pub struct FleetStatus {
    pub cluster_id: Uuid,
    pub effective_max: usize,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub groups: Vec<NodeGroupStatus>,
}

/// Internal health/debug routes. Read-only: scaling goes through the library API.
pub fn router(manager: Arc<FleetManager>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/admin/status", get(get_status))
        .with_state(manager)
}

async fn root() -> &'static str {
    "nodefleet autoscaler online"
}

async fn get_status(State(manager): State<Arc<FleetManager>>) -> Json<FleetStatus> {
    let snapshot = manager.snapshot().await;
    let mut groups = Vec::with_capacity(snapshot.groups.len());
    for group in &snapshot.groups {
        groups.push(group.status().await);
    }

    Json(FleetStatus {
        cluster_id: manager.cluster_id(),
        effective_max: manager.effective_max(),
        refreshed_at: snapshot.refreshed_at,
        groups,
    })
}
