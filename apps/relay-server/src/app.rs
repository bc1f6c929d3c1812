//! Application state and initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use relay_adapters::{OpenAiClient, SlackClient};
use relay_core::RelayConfig;
use relay_webhook::RequestHandler;

use crate::cli::Args;
use crate::server::Server;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub handler: Arc<RequestHandler>,
}

impl AppState {
    /// Wire the HTTP clients and the delivery handler from configuration
    pub fn new(config: RelayConfig) -> Result<Self> {
        info!(
            model = %config.openai_model,
            openai_base_url = %config.openai_base_url,
            slack_api_base_url = %config.slack_api_base_url,
            tolerance_seconds = config.signature_tolerance_seconds,
            "Initializing relay components"
        );

        let completions =
            OpenAiClient::from_config(&config).context("Failed to create completion client")?;
        let chat = SlackClient::from_config(&config).context("Failed to create Slack client")?;

        let handler = RequestHandler::from_config(&config, Arc::new(completions), Arc::new(chat));

        Ok(Self {
            config: Arc::new(config),
            handler: Arc::new(handler),
        })
    }
}

/// Main application
pub struct App {
    args: Args,
    state: AppState,
}

impl App {
    pub fn build(args: Args) -> Result<Self> {
        args.validate().context("Invalid command line arguments")?;

        let config = match &args.config {
            Some(path) => {
                let path = path
                    .to_str()
                    .context("Config path is not valid UTF-8")?;
                RelayConfig::load_from_file(path)
            }
            None => RelayConfig::load(),
        }
        .context("Failed to load configuration")?;

        let state = AppState::new(config)?;

        Ok(Self { args, state })
    }

    pub async fn run(self) -> Result<()> {
        info!(
            port = self.args.port,
            model = %self.state.config.openai_model,
            "Starting server"
        );

        let server = Server::new(self.args, self.state);
        server.run().await
    }
}
