use clap::Parser;
use scheme_finder::{agent::SchemeAssistant, api::start_server, config::AppConfig, logging::init_tracing};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// HTTP server for the scheme finder
#[derive(Parser, Debug)]
#[command(name = "api", version)]
struct Args {
    /// Listen port (defaults to PORT / API_PORT, then 8080)
    #[arg(long)]
    port: Option<u16>,

    /// Seconds between idle-session sweeps
    #[arg(long, default_value_t = 300)]
    cleanup_every: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let _guard = init_tracing("info,scheme_finder=debug")?;

    let config = AppConfig::from_env()?;
    let port = args.port.unwrap_or(config.port);

    info!("🚀 Government Scheme Finder - API Server");
    info!("📍 Port: {}", port);

    let assistant = Arc::new(SchemeAssistant::new(
        config.build_model()?,
        config.build_embedder()?,
        config.build_index().await?,
        config.build_store().await?,
        config.assistant_settings(),
    ));
    assistant
        .sessions()
        .spawn_cleanup(Duration::from_secs(args.cleanup_every.max(1)));

    info!("✅ Scheme assistant initialized");
    info!("📡 Starting API server...");

    start_server(assistant, port).await?;

    Ok(())
}
