//! Cluster harvester - continuous pod/node usage sampling daemon
//!
//! Samples resource usage for every ready pod and node on an interval,
//! appends the samples to per-entity series stores, and summarizes the
//! run into min/max/avg reports after shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use harvester_lib::{
    analysis::{AnalysisEngine, AnalysisOptions},
    export::{ExportSink, JsonFileSink},
    health::{components, HealthRegistry},
    models::{EntityKind, Scope},
    observability::HarvesterMetrics,
    series::SeriesWriter,
    session::{CollectionSession, SessionRegistry},
    source::KubectlSource,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting harvester");

    let config = config::HarvesterConfig::load()?;
    info!(
        run = %config.run_id,
        store_root = %config.store_root,
        namespace = config.namespace.as_deref().unwrap_or("<default>"),
        "Harvester configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::COLLECTOR).await;
    health_registry.register(components::STORE).await;
    health_registry.register(components::EXPORT).await;

    let metrics = HarvesterMetrics::new();
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));

    // Start health and metrics server
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let source: Arc<KubectlSource> = Arc::new(KubectlSource::new());
    let registry = SessionRegistry::new();

    let pods = CollectionSession::new(
        "pods",
        Scope::Discover {
            kind: EntityKind::Pod,
            namespace: config.namespace.clone(),
        },
        Duration::from_secs(config.pod_interval_secs),
        source.clone(),
        SeriesWriter::new(&config.store_root, &config.run_id),
        registry.token().clone(),
    );
    registry.register(pods.spawn());

    let nodes = CollectionSession::new(
        "nodes",
        Scope::Discover {
            kind: EntityKind::Node,
            namespace: None,
        },
        Duration::from_secs(config.node_interval_secs),
        source,
        SeriesWriter::new(&config.store_root, &config.run_id),
        registry.token().clone(),
    );
    registry.register(nodes.spawn());

    // Mark harvester as ready once both sessions are running
    health_registry.set_ready(true).await;

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received, draining sessions");
    health_registry.set_ready(false).await;

    let outcomes = registry
        .drain(Duration::from_secs(config.drain_timeout_secs))
        .await
        .context("draining collection sessions")?;
    for (session, result) in &outcomes {
        if let Err(e) = result {
            warn!(session = %session, error = %e, "session ended with failure");
            health_registry
                .set_unhealthy(components::STORE, e.to_string())
                .await;
        }
    }

    let options = AnalysisOptions {
        sort_by: config.sort_by.clone(),
        export: config
            .export_path
            .as_ref()
            .map(|path| Arc::new(JsonFileSink::new(path)) as Arc<dyn ExportSink>),
    };
    let engine = AnalysisEngine::new(&config.store_root);
    let reports = engine
        .analyze(&config.run_id, &options)
        .await
        .context("analyzing run")?;

    if config.export_path.is_some() && reports.iter().any(|r| r.export_marker.is_none()) {
        health_registry
            .set_degraded(components::EXPORT, "export sink rejected run rows")
            .await;
    }

    for report in &reports {
        match serde_json::to_string(report) {
            Ok(summary) => info!(summary = %summary, "entity summary"),
            Err(e) => {
                warn!(entity = %report.entity_name, error = %e, "summary serialization failed")
            }
        }
    }
    info!(run = %config.run_id, entities = reports.len(), "run summarized");

    api_handle.abort();
    Ok(())
}
