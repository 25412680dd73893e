use anyhow::Result;
use chrono::Utc;
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use mesh_health::{
    load_config, HealthService, HealthSummary, KubeOrchestrator, PrometheusClient, RequestContext,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cfg = load_config()?;
    info!("namespaces = {:?}, view = {:?}", cfg.namespaces, cfg.health_kind);

    let client = Client::try_default().await?;
    let service = HealthService::new(
        Arc::new(KubeOrchestrator::new(client)),
        Arc::new(PrometheusClient::new(cfg.prometheus_url.clone())),
    )
    .with_sidecar_annotation(cfg.sidecar_annotation.clone());

    let ctx = RequestContext::new().with_timeout(Duration::from_secs(cfg.query_timeout_seconds));
    let query_time = Utc::now();

    let mut reports = Vec::with_capacity(cfg.namespaces.len());
    for ns in &cfg.namespaces {
        info!("Computing health for namespace: {}", ns);
        let report = service
            .namespace_health(&ctx, cfg.health_kind, ns, &cfg.rate_interval, query_time)
            .await?;
        reports.push(report);
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);

    let summary = HealthSummary::from_reports(&reports);
    info!(
        "Health summary: {} entities, {} with request errors, {} without request data",
        summary.entity_count, summary.erroring_count, summary.no_data_count
    );
    if summary.has_issues() {
        warn!("Request errors detected in {} entities", summary.erroring_count);
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
