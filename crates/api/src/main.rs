use std::sync::Arc;

use anyhow::Context;

use stockflow_api::app::{build_app, services};
use stockflow_api::{DEFAULT_BIND, ENV_BIND};
use stockflow_infra::InfraConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockflow_observability::init();

    let config = InfraConfig::from_env().context("invalid configuration")?;
    let bind = std::env::var(ENV_BIND).unwrap_or_else(|_| DEFAULT_BIND.to_string());

    let services = services::build_services(&config)
        .await
        .context("failed to open inventory store")?;
    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    tracing::info!(
        retry_attempts = config.retry.max_attempts(),
        "listening on {}",
        listener.local_addr()?
    );

    axum::serve(listener, app).await?;
    Ok(())
}
