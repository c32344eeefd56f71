mod common;

use common::{default_service, group, Fleet, PLAN_MAX};
use nodefleet_autoscaler::refresh_job;
use nodefleet_autoscaler::{AutoscalerError, FleetManager, GroupBounds, NodeGroupStatus};
use nodefleet_providers::mock::MockNodeGroupService;
use nodefleet_providers::ServiceError;
use std::time::Duration;
use uuid::Uuid;

async fn statuses(manager: &FleetManager) -> Vec<NodeGroupStatus> {
    let mut out = Vec::new();
    for g in manager.list_groups().await {
        out.push(g.status().await);
    }
    out
}

#[tokio::test]
async fn test_new_uses_plan_max_when_unset() {
    let fleet = Fleet::new();
    let manager = fleet.manager().await;

    assert_eq!(manager.cluster_id(), fleet.cluster_id);
    assert_eq!(manager.effective_max(), PLAN_MAX);
    assert!(manager.overrides().is_empty());
    assert!(manager.list_groups().await.is_empty());
    assert!(manager.snapshot().await.refreshed_at.is_none());
}

#[tokio::test]
async fn test_new_rejects_invalid_cluster_id() {
    let mut fleet = Fleet::new();
    fleet.config.cluster_id = "not-a-uuid".to_string();

    let err = FleetManager::new(fleet.dyn_service(), &fleet.config, fleet.clock.clone())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, AutoscalerError::Configuration(_)));
    assert_eq!(fleet.service.calls("get_cluster").await, 0);
}

#[tokio::test]
async fn test_new_maps_cluster_lookup_failures() {
    let fleet = Fleet::new();
    fleet
        .service
        .fail_get_cluster(Some(ServiceError::PermissionDenied("forbidden".to_string())))
        .await;
    let err = FleetManager::new(fleet.dyn_service(), &fleet.config, fleet.clock.clone())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AutoscalerError::Authorization { .. }));

    // Unknown cluster.
    let mut fleet = Fleet::new();
    fleet.config.cluster_id = Uuid::new_v4().to_string();
    let err = FleetManager::new(fleet.dyn_service(), &fleet.config, fleet.clock.clone())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AutoscalerError::NotFound { .. }));
}

#[tokio::test]
async fn test_new_validates_overrides() {
    let mut fleet = Fleet::new();
    fleet.config.node_group_specs = vec!["1:3:group1".to_string(), "2:21:group2".to_string()];
    let err = FleetManager::new(fleet.dyn_service(), &fleet.config, fleet.clock.clone())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AutoscalerError::Configuration(_)));
    assert!(err.to_string().contains("2:21:group2"));

    fleet.config.max_nodes_total = 10;
    fleet.config.node_group_specs = vec!["1:12:group1".to_string()];
    let err = FleetManager::new(fleet.dyn_service(), &fleet.config, fleet.clock.clone())
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("exceeds cluster maximum 10"));
}

#[tokio::test]
async fn test_refresh_builds_groups_with_default_bounds() {
    let fleet = Fleet::new();
    let manager = fleet.refreshed_manager().await;

    let groups = statuses(&manager).await;
    let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["group1", "group2"]);
    for g in &groups {
        assert_eq!((g.min_size, g.max_size), (1, PLAN_MAX));
    }
    assert_eq!(groups[0].target_size, 2);
    assert_eq!(groups[1].target_size, 3);
    assert_eq!(groups[1].nodes.len(), 3);
    assert!(manager.snapshot().await.refreshed_at.is_some());
}

#[tokio::test]
async fn test_overrides_survive_repeated_refreshes() {
    let mut fleet = Fleet::new();
    fleet.config.node_group_specs = vec!["2:6:group2".to_string()];
    let manager = fleet.manager().await;
    assert_eq!(
        manager.overrides().get("group2"),
        Some(&GroupBounds {
            min_size: 2,
            max_size: 6
        })
    );

    for _ in 0..3 {
        manager.refresh().await.unwrap();
        let g2 = fleet.group(&manager, "group2").await;
        assert_eq!((g2.min_size(), g2.max_size()), (2, 6));
        let g1 = fleet.group(&manager, "group1").await;
        assert_eq!((g1.min_size(), g1.max_size()), (1, PLAN_MAX));
    }
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let fleet = Fleet::new();
    let manager = fleet.manager().await;

    manager.refresh().await.unwrap();
    let first = statuses(&manager).await;
    manager.refresh().await.unwrap();
    let second = statuses(&manager).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_appended_group_appears_only_after_refresh() {
    let fleet = Fleet::new();
    let manager = fleet.refreshed_manager().await;
    assert_eq!(manager.list_groups().await.len(), 2);

    fleet
        .service
        .append_node_group(fleet.cluster_id, group("group3", 1))
        .await
        .unwrap();
    assert_eq!(manager.list_groups().await.len(), 2);
    assert!(manager.group("group3").await.is_none());

    manager.refresh().await.unwrap();
    assert_eq!(manager.list_groups().await.len(), 3);
    assert_eq!(fleet.group(&manager, "group3").await.target_size().await, 1);

    fleet
        .service
        .remove_node_group(fleet.cluster_id, "group1")
        .await
        .unwrap();
    manager.refresh().await.unwrap();
    assert!(manager.group("group1").await.is_none());
    assert_eq!(manager.list_groups().await.len(), 2);
}

#[tokio::test]
async fn test_refresh_picks_up_remote_resize() {
    let fleet = Fleet::new();
    let manager = fleet.refreshed_manager().await;

    fleet
        .service
        .set_remote_count(fleet.cluster_id, "group2", 5)
        .await
        .unwrap();
    assert_eq!(fleet.group(&manager, "group2").await.target_size().await, 3);

    manager.refresh().await.unwrap();
    let g2 = fleet.group(&manager, "group2").await;
    assert_eq!(g2.target_size().await, 5);
    assert_eq!(g2.nodes().await.len(), 5);
}

#[tokio::test]
async fn test_failing_details_drop_only_that_group() {
    let fleet = Fleet::new();
    let manager = fleet.refreshed_manager().await;
    fleet
        .service
        .fail_details(
            fleet.cluster_id,
            "group1",
            Some(ServiceError::Transport("timeout".to_string())),
        )
        .await
        .unwrap();

    manager.refresh().await.unwrap();
    let names: Vec<String> = manager
        .list_groups()
        .await
        .iter()
        .map(|g| g.name().to_string())
        .collect();
    assert_eq!(names, vec!["group2".to_string()]);

    fleet
        .service
        .fail_details(fleet.cluster_id, "group1", None)
        .await
        .unwrap();
    manager.refresh().await.unwrap();
    assert_eq!(manager.list_groups().await.len(), 2);
}

#[tokio::test]
async fn test_failing_list_keeps_previous_snapshot() {
    let fleet = Fleet::new();
    let manager = fleet.refreshed_manager().await;
    let before = manager.snapshot().await;
    fleet
        .service
        .fail_list_node_groups(Some(ServiceError::Api {
            status: 503,
            body: "maintenance".to_string(),
        }))
        .await;

    let err = manager.refresh().await.unwrap_err();

    assert!(err.is_transient());
    assert!(err.to_string().contains(&fleet.cluster_id.to_string()));
    let after = manager.snapshot().await;
    assert_eq!(after.groups.len(), 2);
    assert_eq!(after.refreshed_at, before.refreshed_at);
}

#[tokio::test]
async fn test_refresh_once_reports_group_count() {
    let fleet = Fleet::new();
    let manager = fleet.manager().await;
    assert_eq!(refresh_job::refresh_once(&manager).await.unwrap(), 2);
}

#[tokio::test]
async fn test_new_with_empty_cluster() {
    let cluster_id = Uuid::new_v4();
    let service = MockNodeGroupService::new()
        .with_plan("dev", 5)
        .with_cluster(cluster_id, "dev", Vec::new());
    let fleet = Fleet::with_service(cluster_id, service);
    let manager = fleet.refreshed_manager().await;

    assert_eq!(manager.effective_max(), 5);
    assert!(manager.list_groups().await.is_empty());
}

#[tokio::test]
async fn test_scale_on_handle_is_visible_in_snapshot() {
    let cluster_id = Uuid::new_v4();
    let fleet = Fleet::with_service(cluster_id, default_service(cluster_id));
    let manager = fleet.refreshed_manager().await;

    fleet.group(&manager, "group1").await.increase_size(1).await.unwrap();

    let groups = statuses(&manager).await;
    assert_eq!(groups[0].target_size, 3);
}

#[tokio::test(start_paused = true)]
async fn test_slow_listing_is_transient() {
    let fleet = Fleet::new();
    let manager = fleet.refreshed_manager().await;
    fleet.service.set_latency(Some(Duration::from_secs(30))).await;

    let err = manager.refresh().await.unwrap_err();

    assert!(err.is_transient(), "{err:?}");
    assert!(err.to_string().contains("timed out"));
    assert_eq!(manager.list_groups().await.len(), 2);
}
