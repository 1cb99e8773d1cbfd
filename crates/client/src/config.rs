use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
}

/// Connection settings loaded from environment variables.
///
/// The write token is optional: without it the client can query and
/// listen, and every mutating entry point refuses to run.
#[derive(Debug, Clone)]
pub struct SanityConfig {
    /// Sanity project ID.
    pub project_id: String,
    /// Dataset name (e.g. "production").
    pub dataset: String,
    /// API version date string.
    pub api_version: String,
    /// Write-access API token. Absence forces read-only behavior.
    pub token: Option<String>,
    /// Log level used when RUST_LOG is unset.
    pub log_level: String,
}

impl SanityConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            project_id: env::var("SANITY_PROJECT_ID")
                .map_err(|_| ConfigError::Missing("SANITY_PROJECT_ID"))?,
            dataset: env::var("SANITY_DATASET").unwrap_or_else(|_| "production".to_string()),
            api_version: env::var("SANITY_API_VERSION")
                .unwrap_or_else(|_| "2024-03-01".to_string()),
            token: env::var("SANITY_API_TOKEN").ok().filter(|t| !t.is_empty()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Base URL for all API calls.
    pub fn base_url(&self) -> String {
        format!(
            "https://{}.api.sanity.io/v{}",
            self.project_id, self.api_version
        )
    }

    /// Whether mutating calls are permitted.
    pub fn can_write(&self) -> bool {
        self.token.is_some()
    }
}
