use std::sync::Arc;

use anyhow::Context;
use nodefleet_autoscaler::provider_manager::ProviderManager;
use nodefleet_autoscaler::{refresh_job, status, AutoscalerConfig, FleetManager, TokioClock};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = AutoscalerConfig::from_env().context("failed to load configuration")?;
    info!(
        provider = %config.provider,
        cluster = %config.manager.cluster_id,
        "starting nodefleet autoscaler"
    );

    let service = ProviderManager::get_service(&config).context("failed to build node group service")?;

    let init_timeout = config.manager.timeouts.provider_init;
    let manager = tokio::time::timeout(
        init_timeout,
        FleetManager::new(service, &config.manager, Arc::new(TokioClock)),
    )
    .await
    .with_context(|| format!("fleet manager construction timed out after {:?}", init_timeout))?
    .context("failed to create fleet manager")?;
    let manager = Arc::new(manager);
    info!("✅ Fleet manager ready (effective max {} nodes)", manager.effective_max());

    // Populate the cache before serving so the first status read is meaningful.
    if let Err(e) = manager.refresh().await {
        warn!("initial refresh failed, job-refresh will retry: {}", e);
    }

    // job-refresh
    let manager_refresh = manager.clone();
    let every = config.refresh_interval;
    tokio::spawn(async move {
        refresh_job::run(manager_refresh, every).await;
    });

    let app = status::router(manager);
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!("Autoscaler status listening on {}", config.listen_addr);
    axum::serve(listener, app).await.context("status server failed")?;
    Ok(())
}
