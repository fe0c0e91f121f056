//! Demo server for Google OpenID / Federated Login
//!
//! `/` greets the logged-in user and sends everyone else through the
//! provider. `/whoami` reports the current identity as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use fedauth_identity_openid::NonceStore;
use fedauth_session::SessionStore;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod config;

use crate::cli::Args;
use crate::config::Config;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    if args.check_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    init_tracing(&config);

    let app = app::build(&config)?;

    let sessions = app.sessions.clone();
    let nonces = app.nonces.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match sessions.cleanup_expired().await {
                Ok(removed) => debug!("Removed {} expired sessions", removed),
                Err(e) => error!("Session cleanup failed: {}", e),
            }
            match nonces.cleanup_expired().await {
                Ok(removed) => debug!("Removed {} expired nonces", removed),
                Err(e) => error!("Nonce cleanup failed: {}", e),
            }
        }
    });

    let addr = config.socket_addr();
    info!("fedauth server listening on http://{}", addr);
    match &config.auth.domain {
        Some(domain) => info!("Federated Login restricted to {}", domain),
        None => info!("Accepting any Google account"),
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.router).await?;

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::new(config.log_filter());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.pretty().init(),
    }
}
