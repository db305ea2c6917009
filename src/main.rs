//! Server binary: upload form, job status and rendered video delivery.

use lyricwipe::adapters::{self, http};
use lyricwipe::application::orchestrator::Pipeline;
use lyricwipe::application::registry::JobRegistry;
use lyricwipe::config::AppConfig;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    tokio::fs::create_dir_all(&config.pipeline.output_dir).await?;
    tokio::fs::create_dir_all(&config.pipeline.work_dir).await?;

    // 1. Adapters
    let collaborators = adapters::collaborators(&config.tools, &config.pipeline.language);

    // 2. Application services
    let pipeline = Arc::new(Pipeline::new(collaborators, config.pipeline.clone()));
    let registry = Arc::new(JobRegistry::new(
        pipeline,
        config.max_concurrent_jobs,
        config.keep_uploads,
    ));

    // 3. HTTP layer
    let app = http::router(
        http::AppState {
            registry,
            upload_dir: config.upload_dir.clone(),
            output_dir: config.pipeline.output_dir.clone(),
            default_model: config.pipeline.default_model.clone(),
            status_log_tail: config.status_log_tail,
        },
        config.max_upload_bytes,
    );

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.addr, config.port)).await?;
    tracing::info!(
        addr = %config.addr,
        port = %config.port,
        workers = config.max_concurrent_jobs,
        "listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
