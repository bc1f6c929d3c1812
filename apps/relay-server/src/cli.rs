//! Command-line argument parsing

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "relay-server",
    about = "Slack completion relay",
    version,
    long_about = "Receives signed Slack event deliveries, asks a chat completion \
                  API for a reply and posts it back into the originating thread."
)]
pub struct Args {
    /// Optional configuration file; environment variables override it
    #[arg(short, long, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// HTTP server port
    #[arg(short, long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    /// Enable JSON log format (useful for production)
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,
}

impl Args {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(path) = &self.config {
            if !path.exists() {
                anyhow::bail!("config file {} does not exist", path.display());
            }
        }
        Ok(())
    }
}
