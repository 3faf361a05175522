//! PQC Messenger - identity, key custody and signed-message integrity service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pqc_messenger::{
    config::{Args, LogFormat},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("pqc_messenger={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    match args.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  PQC Messenger");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Store: {:?}", args.store);
    info!("Signature preference: {}", args.signature_algorithms);
    info!("KEM preference: {}", args.kem_algorithms);
    match args.session_ttl_seconds {
        Some(ttl) => info!("Session TTL: {}s", ttl),
        None => info!("Session TTL: none (sessions live until logout)"),
    }

    let state = Arc::new(AppState::from_args(args).await?);

    if let Err(e) = server::run(state).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
