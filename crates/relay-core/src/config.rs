use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, Map};
use secrecy::{ExposeSecret, Secret, SecretString};
use serde::Deserialize;

/// Main relay configuration
///
/// Keys map one-to-one onto environment variables (`SLACK_BOT_TOKEN` becomes
/// `slack_bot_token`). The three credentials have no defaults: a process
/// without them must not start.
#[derive(Debug, Deserialize)]
pub struct RelayConfig {
    /// Bot token used to post replies
    pub slack_bot_token: SecretString,
    /// Shared secret Slack signs each delivery with
    pub slack_signing_secret: SecretString,
    /// Completion API key
    pub openai_api_key: SecretString,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_slack_api_base_url")]
    pub slack_api_base_url: String,
    /// Maximum accepted distance between the delivery timestamp and now
    #[serde(default = "default_signature_tolerance_seconds")]
    pub signature_tolerance_seconds: i64,
}

impl RelayConfig {
    pub fn new(slack_bot_token: &str, slack_signing_secret: &str, openai_api_key: &str) -> Self {
        Self {
            slack_bot_token: Secret::new(slack_bot_token.to_string()),
            slack_signing_secret: Secret::new(slack_signing_secret.to_string()),
            openai_api_key: Secret::new(openai_api_key.to_string()),
            openai_model: default_openai_model(),
            openai_base_url: default_openai_base_url(),
            slack_api_base_url: default_slack_api_base_url(),
            signature_tolerance_seconds: default_signature_tolerance_seconds(),
        }
    }

    /// Load configuration from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(Environment::default())
            .build()?
            .try_deserialize::<Self>()?
            .validate()
    }

    /// Load configuration from an explicit variable map instead of the
    /// process environment
    pub fn load_from_vars(vars: Map<String, String>) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(Environment::default().source(Some(vars)))
            .build()?
            .try_deserialize::<Self>()?
            .validate()
    }

    /// Load configuration from file with environment overrides
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::with_name(path))
            .add_source(Environment::default())
            .build()?
            .try_deserialize::<Self>()?
            .validate()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("openai_model", default_openai_model())?
            .set_default("openai_base_url", default_openai_base_url())?
            .set_default("slack_api_base_url", default_slack_api_base_url())?
            .set_default(
                "signature_tolerance_seconds",
                default_signature_tolerance_seconds(),
            )
    }

    /// Reject configurations that deserialize but cannot work
    pub fn validate(self) -> Result<Self, ConfigError> {
        let required = [
            ("SLACK_BOT_TOKEN", &self.slack_bot_token),
            ("SLACK_SIGNING_SECRET", &self.slack_signing_secret),
            ("OPENAI_API_KEY", &self.openai_api_key),
        ];
        for (name, value) in required {
            if value.expose_secret().trim().is_empty() {
                return Err(ConfigError::Message(format!("{} must not be empty", name)));
            }
        }

        if self.signature_tolerance_seconds <= 0 {
            return Err(ConfigError::Message(
                "SIGNATURE_TOLERANCE_SECONDS must be positive".to_string(),
            ));
        }

        if self.openai_model.trim().is_empty() {
            return Err(ConfigError::Message("OPENAI_MODEL must not be empty".to_string()));
        }

        Ok(self)
    }

    pub fn with_openai_model(mut self, model: &str) -> Self {
        self.openai_model = model.to_string();
        self
    }

    pub fn with_openai_base_url(mut self, base_url: &str) -> Self {
        self.openai_base_url = base_url.to_string();
        self
    }

    pub fn with_slack_api_base_url(mut self, base_url: &str) -> Self {
        self.slack_api_base_url = base_url.to_string();
        self
    }

    pub fn with_signature_tolerance(mut self, seconds: i64) -> Self {
        self.signature_tolerance_seconds = seconds;
        self
    }
}

fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_slack_api_base_url() -> String {
    "https://slack.com".to_string()
}

fn default_signature_tolerance_seconds() -> i64 {
    300 // 5 minutes
}
