use std::sync::Arc;

use optimistic_list::todo::http::{self, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        path = %config.path.display(),
        latency_ms = config.latency.as_millis() as u64,
        "starting todo server"
    );

    http::serve(Arc::new(config.store()), &config.addr).await?;
    Ok(())
}
