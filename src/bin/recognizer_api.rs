//! recognizer_api - HTTP service for the object recognizer
//!
//! This daemon:
//! 1. Loads the model once from the configured model directory
//! 2. Serves the detection API until Ctrl-C

use anyhow::Result;
use std::sync::Arc;

use object_recognizer::api::{ApiConfig, ApiServer};
use object_recognizer::config::RecognizerConfig;
use object_recognizer::detect::Recognizer;
use object_recognizer::media::MediaController;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RecognizerConfig::load()?;
    let recognizer = Recognizer::from_config(&config)?;
    let controller = Arc::new(MediaController::from_config(Arc::new(recognizer), &config));

    let api_config = ApiConfig {
        addr: config.api_addr.clone(),
    };
    let handle = ApiServer::new(api_config, controller).spawn().await?;
    log::info!("detection api listening on {}", handle.addr);
    log::info!(
        "recognizer_api running. artifacts in {}",
        config.artifacts_dir.display()
    );

    log::info!("recognizer_api waiting for shutdown signal (Ctrl-C)...");
    tokio::signal::ctrl_c().await?;
    log::info!("shutdown signal received, stopping API server...");
    handle.stop().await?;

    Ok(())
}
