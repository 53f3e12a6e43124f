use anyhow::{Context, Result};
use liveform_server::{app, Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::load_default()?;
    let app = app(&config)?;

    let address = config.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!(
        address = %address,
        endpoint = %config.validation.endpoint,
        rule_sets = config.rule_sets.len(),
        "liveform server listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
