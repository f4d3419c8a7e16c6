//! Scope authorizer server.
//!
//! Loads configuration, the API specification and the issuer's key set, then
//! serves authorization decisions over HTTP until interrupted.

use anyhow::Context;
use clap::Parser;
use scope_authorizer::axum_integration::router;
use scope_authorizer::{AuthorizerConfig, Authorizer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file; environment variables override its values
    #[arg(short, long, env = "AUTHORIZER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "AUTHORIZER_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let config = AuthorizerConfig::load(cli.config.as_ref()).context("loading configuration")?;
    config.validate().context("validating configuration")?;
    info!(
        issuer = %config.issuer_url(),
        table = %config.client_scopes_table,
        policy_key = ?config.policy_key,
        "Configuration loaded"
    );

    let authorizer = Authorizer::connect(&config)
        .await
        .context("building authorizer")?;

    let jwks = Arc::clone(authorizer.verifier().jwks());
    jwks.refresh().await.context("fetching signing keys")?;
    let refresh = jwks.spawn_refresh(config.jwks_cache_ttl());

    let app = router(Arc::new(authorizer));
    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("binding {}", cli.listen))?;
    info!(address = %cli.listen, "Serving authorization decisions");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    refresh.shutdown();
    info!("Stopped");
    Ok(())
}
