use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, error};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated
    pub cors_origins: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// HS256 secret of the identity provider's tokens
    pub auth_jwt_secret: Option<String>,

    /// Database URL, the in-memory store is used without it
    pub db_url: Option<String>,

    /// Idle time before a cached page is evicted
    #[serde(default = "default_doc_cache_ttl_secs")]
    pub doc_cache_ttl_secs: u64,

    /// Capacity of each connection's outbound queue
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Persist every document-update received over the socket
    #[serde(default = "default_persist_on_update")]
    pub persist_on_update: bool,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        // Load from environment variables using envy
        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn doc_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.doc_cache_ttl_secs)
    }

    /// Parsed CORS origins, None means allow any
    pub fn cors_origin_list(&self) -> Option<Vec<String>> {
        let origins: Vec<String> = self
            .cors_origins
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        if origins.is_empty() {
            None
        } else {
            Some(origins)
        }
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            cors_origins: None,
            service_name: default_service_name(),
            auth_jwt_secret: None,
            db_url: None,
            doc_cache_ttl_secs: default_doc_cache_ttl_secs(),
            outbound_buffer: default_outbound_buffer(),
            persist_on_update: default_persist_on_update(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EnvError(envy::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EnvError(e) => write!(f, "Environment variable error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "colabri-pages".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_doc_cache_ttl_secs() -> u64 {
    300
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_persist_on_update() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let config = Config {
            cors_origins: Some(" https://a.example, ,https://b.example ".into()),
            ..Config::default()
        };
        assert_eq!(
            config.cors_origin_list(),
            Some(vec!["https://a.example".to_string(), "https://b.example".to_string()])
        );
        assert_eq!(Config::default().cors_origin_list(), None);
    }

    #[test]
    fn defaults_persist_updates() {
        let config = Config::default();
        assert!(config.persist_on_update);
        assert_eq!(config.server_address(), "0.0.0.0:3000");
        assert!(config.is_development());
    }
}
