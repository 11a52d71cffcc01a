use std::sync::Arc;

use anyhow::Context;
use jobrelay_api::app::{build_app, AppServices};
use jobrelay_infra::AgentConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = AgentConfig::resolve_path(std::env::args().skip(1))?;
    let config = AgentConfig::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    jobrelay_observability::init(config.log_format);
    tracing::info!(config = %path.display(), "configuration loaded");

    let services = Arc::new(AppServices::from_config(&config).context("failed to build HTTP client")?);

    if config.reconcile_on_startup {
        let sweep = services.reconciliation();
        tokio::spawn(async move {
            match sweep.run().await {
                Ok(report) => tracing::info!(corrected = report.corrected, "startup reconciliation done"),
                Err(e) => tracing::warn!(error = %e, "startup reconciliation failed"),
            }
        });
    }

    let app = build_app(services);

    let addr = format!("0.0.0.0:{}", config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
