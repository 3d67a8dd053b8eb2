//! Digimart command-line client
//!
//! Restores the cached session, runs one command and exits. `watch` keeps the
//! periodic session check running until interrupted.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use digimart_client::commands::{self, Cli};
use digimart_client::{AppState, ClientConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing; logs go to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("digimart_client=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Get configuration from environment
    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = cli.api_url.clone() {
        config.api_url = api_url;
    }
    tracing::debug!(api = %config.api_url, session = %config.session_file.display(), "Configuration loaded");

    // Create shared app state and restore the cached session
    let state = AppState::new(config)?;
    state.session.start();

    if let Err(e) = commands::run(cli.command, &state).await {
        if let Some(client_err) = e.downcast_ref::<digimart_client::ClientError>() {
            tracing::debug!(error = ?client_err, "Command failed");
            if client_err.requires_login() {
                anyhow::bail!("{} Run `digimart login` first.", client_err.user_message());
            }
            anyhow::bail!("{}", client_err.user_message());
        }
        return Err(e);
    }
    Ok(())
}
