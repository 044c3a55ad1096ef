use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sweatsmart::analysis::HttpAnalysisClient;

use sweatsmart::config::Config;

use sweatsmart::routes;

use sweatsmart::state::Session;

#[tokio::main]

async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    info!(
        analysis_url = %config.analysis_url,
        scenario = %config.default_scenario,
        latency_ms = config.connect_latency.as_millis() as u64,
        "starting sweatsmart"
    );

    let analysis = HttpAnalysisClient::new(&config).context("building analysis client")?;

    let session = Session::new(Arc::new(analysis), &config);

    let app = routes::router(session, config.max_upload_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    axum::serve(listener, app).await?;

    Ok(())
}
