mod app_state;
mod assignment;
mod backend;
mod config;
mod crypto;
mod db;
mod error;
mod handlers;
mod otp;
mod scan;
mod serial;
mod session;
mod validation;
mod wire;

use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app_state::AppState;
use config::{Cli, Command, ServerConfig};
use crypto::AesKey;
use db::init_pool;
use handlers::build_router;
use otp::LogOtpSender;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "card_assign=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match Cli::parse().command {
        Command::Serve(config) => serve(config).await,
        Command::Assign(config) => session::run_assign(config).await,
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let config = Arc::new(config);

    // Initialize database
    let pool = init_pool(&config.database_url).await?;

    let code_key = match &config.code_key {
        Some(key) => key.clone(),
        None => {
            tracing::warn!("CODE_KEY not set; using a random key, OTPs and hashed codes will not survive a restart");
            AesKey::generate()
        }
    };

    let state = AppState {
        pool,
        config: config.clone(),
        code_key,
        otp_sender: Arc::new(LogOtpSender),
    };

    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.socket_addr()).await?;

    tracing::info!("Server running on {}", config.socket_addr());
    tracing::info!("OTP lifetime: {}s, resend cooldown: {}s", config.otp_ttl_secs, config.resend_cooldown_secs);

    axum::serve(listener, app).await?;

    Ok(())
}
