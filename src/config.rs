use secrecy::Secret;
use serde::Deserialize;

use crate::services::status_resolver::DEFAULT_BLOCK_INTERVAL_SECONDS;

pub const DEFAULT_NODE_URL: &str = "http://127.0.0.1:9944";
pub const DEFAULT_VERIFY_BASE_URL: &str = "https://verisite.io/verify/";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Chain node (JSON-RPC over HTTP)
    pub node_url: String,
    pub node_access_token: Option<Secret<String>>,
    pub connect_timeout_secs: u64,

    // Assumed block production interval used to project expiry onto wall-clock time
    pub block_interval_seconds: i64,

    // Web server
    pub base_url: String,
    pub host: String,
    pub port: u16,

    // Prefix encoded into verification QR codes
    pub verify_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_url: DEFAULT_NODE_URL.to_string(),
            node_access_token: None,
            connect_timeout_secs: 5,
            block_interval_seconds: DEFAULT_BLOCK_INTERVAL_SECONDS,
            base_url: "http://127.0.0.1:3000".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            verify_base_url: DEFAULT_VERIFY_BASE_URL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Self::from_source(&config)
    }

    fn from_source(config: &config::Config) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();

        let block_interval_seconds =
            get_or(config, "block_interval_seconds", defaults.block_interval_seconds)?;
        if block_interval_seconds <= 0 {
            return Err(config::ConfigError::Message(format!(
                "block_interval_seconds must be positive, got {}",
                block_interval_seconds
            )));
        }

        Ok(Self {
            node_url: get_or(config, "node_url", defaults.node_url)?,
            node_access_token: get_or::<Option<String>>(config, "node_access_token", None)?
                .map(Secret::new),
            connect_timeout_secs: get_or(
                config,
                "connect_timeout_secs",
                defaults.connect_timeout_secs,
            )?,

            block_interval_seconds,

            base_url: get_or(config, "base_url", defaults.base_url)?,
            host: get_or(config, "host", defaults.host)?,
            port: get_or(config, "port", defaults.port)?,

            verify_base_url: get_or(config, "verify_base_url", defaults.verify_base_url)?,
        })
    }
}

/// Missing keys take the default; values that fail to parse are errors.
fn get_or<T>(config: &config::Config, key: &str, default: T) -> Result<T, config::ConfigError>
where
    T: serde::de::DeserializeOwned,
{
    match config.get::<T>(key) {
        Err(config::ConfigError::NotFound(_)) => Ok(default),
        other => other,
    }
}
