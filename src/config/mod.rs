//! Application configuration module
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Configuration is loaded with the
//! `STRAND_CONCIERGE` prefix and nested values use double underscores as
//! separators.
//!
//! # Example
//!
//! ```no_run
//! use strand_concierge::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr());
//! ```

mod ai;
mod error;
mod server;

pub use ai::{AiConfig, LibrarianConfigSection};
pub use error::{ConfigError, ValidationError};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Generation capability configuration (Gemini)
    pub ai: AiConfig,

    /// Retrieval service configuration (librarian)
    #[serde(default)]
    pub librarian: LibrarianConfigSection,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Loads a `.env` file if present, then reads environment variables
    /// with the `STRAND_CONCIERGE` prefix:
    ///
    /// - `STRAND_CONCIERGE__SERVER__PORT=8000` -> `server.port = 8000`
    /// - `STRAND_CONCIERGE__AI__GEMINI_API_KEY=...` -> `ai.gemini_api_key`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("STRAND_CONCIERGE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.ai.validate()?;
        self.librarian.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global; serialize these tests.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("STRAND_CONCIERGE__AI__GEMINI_API_KEY", "test-key");
    }

    fn clear_env() {
        env::remove_var("STRAND_CONCIERGE__AI__GEMINI_API_KEY");
        env::remove_var("STRAND_CONCIERGE__SERVER__PORT");
        env::remove_var("STRAND_CONCIERGE__LIBRARIAN__BASE_URL");
    }

    #[test]
    fn loads_from_environment_with_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.ai.gemini_api_key, "test-key");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.librarian.base_url, "http://localhost:8100");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn nested_overrides_apply() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("STRAND_CONCIERGE__SERVER__PORT", "9000");
        env::set_var(
            "STRAND_CONCIERGE__LIBRARIAN__BASE_URL",
            "https://librarian.internal",
        );
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.librarian.base_url, "https://librarian.internal");
    }

    #[test]
    fn missing_api_key_fails_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        assert!(AppConfig::load().is_err());
    }
}
