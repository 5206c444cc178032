// TerraScope - aerial image analysis service
// Launch and it's ready - storage and upload directories are created on demand

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use terrascope_core::config::Config;
use terrascope_inference::HttpInferenceClient;
use terrascope_server::analysis::AnalysisPipeline;
use terrascope_server::http::{create_router, ApiState};
use terrascope_storage::Storage;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "terrascope-server", about = "Aerial image analysis service")]
struct Args {
    /// Address to listen on (overrides TERRASCOPE_LISTEN_ADDR)
    #[arg(long)]
    listen: Option<String>,

    /// Directory for the embedded database (overrides TERRASCOPE_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory for spooled uploads (overrides TERRASCOPE_UPLOAD_DIR)
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Model API endpoint (overrides MODEL_API_URL)
    #[arg(long)]
    model_api_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(upload_dir) = args.upload_dir {
        config.upload_dir = upload_dir;
    }
    if let Some(url) = args.model_api_url {
        config.model_api_url = url;
    }

    info!("🚀 Starting TerraScope...");

    info!("📦 Opening storage at {}...", config.data_dir.display());
    let storage = Storage::open(&config.data_dir)?;
    info!("✅ Storage ready");

    let inference = Arc::new(HttpInferenceClient::new(config.model_api_url.clone()));
    info!("🛰️  Model API endpoint: {}", config.model_api_url);

    let pipeline = Arc::new(AnalysisPipeline::new(storage.clone(), inference));
    let state = ApiState {
        storage,
        pipeline,
        upload_dir: config.upload_dir.clone(),
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("🌍 Listening on {}", config.listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 TerraScope stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
