#![forbid(unsafe_code)]

//! Vestibule server entry point.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use vestibule_web::Settings;

/// OIDC-gated web front end
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to an optional vestibule.toml)
    #[arg(short, long, env = "VESTIBULE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address from configuration
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vestibule=debug,tower_http=debug".into()),
        )
        .init();

    // Configuration errors are fatal before anything binds
    let mut settings =
        Settings::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(bind) = args.bind {
        settings.app.server.bind = bind;
    }

    tracing::info!(
        environment = %settings.app.server.environment,
        instance = settings.provider.instance(),
        policy = settings.provider.sign_up_sign_in_policy_id(),
        "Starting Vestibule"
    );

    vestibule_web::serve(settings).await?;
    Ok(())
}
