use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Where conversation snapshots are stored.
    #[serde(default = "default_data_path")]
    pub data_path: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_format")]
    pub log_format: String,

    // Secret (from ENV only)
    #[serde(default)]
    pub openai_api_key: String,
}

fn default_model() -> String {
    legate_core::DEFAULT_MODEL.to_string()
}

fn default_assistant_name() -> String {
    legate_core::DEFAULT_ASSISTANT_NAME.to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_polls() -> u32 {
    600
}

fn default_data_path() -> String {
    "data/threads.json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Settings {
    /// Load configuration from TOML file and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. Environment variables with the LEGATE_ prefix
    /// 3. OPENAI_API_KEY from the environment (required, never in TOML)
    pub fn load() -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(Environment::default().prefix("LEGATE").try_parsing(true));

        let config = builder.build()?;
        let mut settings: Settings = config.try_deserialize()?;

        // Load secrets from ENV (not in TOML)
        settings.openai_api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            ConfigError::Message("OPENAI_API_KEY environment variable is required".to_string())
        })?;

        Ok(settings)
    }
}
