//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! A handful of deployment-style environment variables are honored without the
//! APP_ prefix because that is what hosting platforms and the original service
//! contract expect: `HOST`, `PORT`, `WHISPER_MODEL`, `WHISPER_LANGUAGE`, `DEBUG`.
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Deployment environment variables (HOST, PORT, WHISPER_MODEL, ...)
//! 2. Prefixed environment variables (APP_SERVER_HOST, APP_SERVER_PORT, ...)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (server, model, upload)
/// keeps each section small and makes env-var mapping predictable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub upload: UploadConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind the server to (e.g., "127.0.0.1", "0.0.0.0")
/// - `port`: TCP port number to listen on
/// - `debug`: widens the default log filter to debug level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
}

/// Speech-recognition model configuration.
///
/// ## Fields:
/// - `name`: Whisper model selector ("tiny", "base", "small", "medium", "large-v3", ...)
///   or a filesystem path to a GGML model file
/// - `language`: default language hint applied when a request carries none;
///   unset means auto-detect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// Upload handling configuration.
///
/// ## Fields:
/// - `limit`: maximum accepted upload size in bytes; larger requests are
///   rejected with 413 before any inference work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub limit: usize,
}

/// Provides default configuration values.
///
/// ## Why defaults matter:
/// Default values ensure the application can start even if no configuration
/// file exists. They also serve as documentation of reasonable starting values.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(), // Accept connections from any interface
                port: 5000,
                debug: false,
            },
            model: ModelConfig {
                name: "large-v3".to_string(), // Best accuracy; override for small machines
                language: None,               // Auto-detect per request
            },
            upload: UploadConfig {
                limit: 40 * 1024 * 1024, // 40 MiB upload ceiling
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle the deployment variables (HOST, PORT, WHISPER_MODEL,
    ///    WHISPER_LANGUAGE, DEBUG) as explicit overrides
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_HOST=127.0.0.1`: Override server host
    /// - `PORT=8080`: Special case for deployment platforms
    /// - `WHISPER_MODEL=base`: Select a smaller model
    /// - `WHISPER_LANGUAGE=english`: Default language hint for all requests
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            // 1. Start with defaults - converts our Default impl to config format
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // 2. Load from config.toml file (if it exists)
            .add_source(config::File::with_name("config").required(false))
            // 3. Load from environment variables with APP_ prefix
            // Example: APP_SERVER_HOST becomes server.host in the config
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment variables that don't follow the APP_ prefix convention
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(model) = env::var("WHISPER_MODEL") {
            settings = settings.set_override("model.name", model)?;
        }

        if let Ok(language) = env::var("WHISPER_LANGUAGE") {
            settings = settings.set_override("model.language", language)?;
        }

        if let Ok(debug) = env::var("DEBUG") {
            let enabled = debug == "1" || debug.eq_ignore_ascii_case("true");
            settings = settings.set_override("server.debug", enabled)?;
        }

        // Build the final configuration and convert it back to our AppConfig struct
        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0 (port 0 is reserved and can't be used)
    /// - Upload limit is greater than 0 (a zero limit rejects every upload)
    /// - Model name is not empty (there is no model to load otherwise)
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.upload.limit == 0 {
            return Err(anyhow::anyhow!("Upload limit must be greater than 0"));
        }

        if self.model.name.trim().is_empty() {
            return Err(anyhow::anyhow!("Model name cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the default configuration is valid and has expected values.
    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert!(!config.server.debug);
        assert_eq!(config.model.name, "large-v3");
        assert_eq!(config.model.language, None);
        assert_eq!(config.upload.limit, 40 * 1024 * 1024);
        // Ensure the default config passes validation
        assert!(config.validate().is_ok());
    }

    /// Test that validation catches invalid configurations.
    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0; // Invalid port
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.upload.limit = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.model.name = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
