//! Runtime configuration
//!
//! A single credential (`GEMINI_API_KEY`) is required; model ids and the
//! canvas temperature can be overridden through the environment. Call
//! `dotenv::dotenv().ok()` before `Config::from_env` so a local `.env`
//! file is honored.

use crate::error::CanvasError;
use crate::Result;
use std::env;

/// Default model for the canvas dialogue and extraction calls
pub const DEFAULT_CANVAS_MODEL: &str = "gemini-2.5-flash";

/// Basic tier for the orchestration experiment (short conversations)
pub const DEFAULT_BASIC_MODEL: &str = "gemini-2.0-flash";

/// Advanced tier for the orchestration experiment (long conversations)
pub const DEFAULT_ADVANCED_MODEL: &str = "gemini-2.5-flash";

const DEFAULT_TEMPERATURE: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub canvas_model: String,
    pub basic_model: String,
    pub advanced_model: String,
    pub temperature: f32,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Fails when `GEMINI_API_KEY` is missing or empty.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(CanvasError::ConfigError(
                "GEMINI_API_KEY is not set. Add it to your environment or a local .env file."
                    .to_string(),
            ));
        }

        let temperature = env::var("CANVAS_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(DEFAULT_TEMPERATURE);

        Ok(Self {
            api_key,
            canvas_model: env::var("CANVAS_MODEL")
                .unwrap_or_else(|_| DEFAULT_CANVAS_MODEL.to_string()),
            basic_model: env::var("BASIC_MODEL")
                .unwrap_or_else(|_| DEFAULT_BASIC_MODEL.to_string()),
            advanced_model: env::var("ADVANCED_MODEL")
                .unwrap_or_else(|_| DEFAULT_ADVANCED_MODEL.to_string()),
            temperature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so the GEMINI_API_KEY mutations never race across threads.
    #[test]
    fn test_from_env() {
        env::remove_var("GEMINI_API_KEY");
        let result = Config::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("GEMINI_API_KEY"));

        env::set_var("GEMINI_API_KEY", "test-key");
        env::remove_var("CANVAS_MODEL");
        env::remove_var("CANVAS_TEMPERATURE");

        let config = Config::from_env().unwrap();
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.canvas_model, DEFAULT_CANVAS_MODEL);
        assert_eq!(config.basic_model, DEFAULT_BASIC_MODEL);
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);

        env::remove_var("GEMINI_API_KEY");
    }
}
