use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}

/// Runtime configuration for the server binary, read from the environment
/// (a `.env` file is honored when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub project_id: String,
    pub api_key: String,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; deployments set variables directly.
        let _ = dotenvy::dotenv();

        Ok(AppConfig {
            project_id: require("FIRESTORE_PROJECT_ID")?,
            api_key: require("FIRESTORE_API_KEY")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string()),
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_count_as_missing() {
        env::set_var("INTERN_UPLOADER_TEST_BLANK", "  ");
        assert!(matches!(
            require("INTERN_UPLOADER_TEST_BLANK"),
            Err(ConfigError::Missing(_))
        ));

        env::set_var("INTERN_UPLOADER_TEST_SET", "value");
        assert_eq!(require("INTERN_UPLOADER_TEST_SET").unwrap(), "value");
    }
}
