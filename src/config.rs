// src/config.rs

use std::env;
use std::fmt;
use std::time::Duration;

use crate::errors::AppError;

pub const DEFAULT_COMMERCE_API_URL: &str = "https://api.commerce.naver.com";
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_REGISTRATION_TIMEOUT_SECS: u64 = 120;

/// Application id/secret issued by the commerce provider.
#[derive(Clone)]
pub struct CommerceCredentials {
    pub application_id: String,
    pub application_secret: String,
}

impl fmt::Debug for CommerceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommerceCredentials")
            .field("application_id", &self.application_id)
            .field("application_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub commerce_credentials: CommerceCredentials,
    pub commerce_api_url: String,
    pub gemini: GeminiConfig,
    pub port: u16,
    pub registration_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, AppError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::Configuration(format!("{} must be set", key)))
        };
        let optional = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let commerce_credentials = CommerceCredentials {
            application_id: required("NAVER_COMMERCE_APP_ID")?,
            application_secret: required("NAVER_COMMERCE_APP_SECRET")?,
        };

        let gemini = GeminiConfig {
            api_key: required("GEMINI_API_KEY")?,
            api_url: optional("GEMINI_API_URL", DEFAULT_GEMINI_API_URL),
            model: optional("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
        };

        let port = optional("PORT", &DEFAULT_PORT.to_string())
            .parse::<u16>()
            .map_err(|_| AppError::Configuration("PORT must be a valid port number".into()))?;

        let timeout_secs = optional(
            "REGISTRATION_TIMEOUT_SECS",
            &DEFAULT_REGISTRATION_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|_| {
            AppError::Configuration("REGISTRATION_TIMEOUT_SECS must be a number".into())
        })?;

        Ok(AppConfig {
            commerce_credentials,
            commerce_api_url: optional("COMMERCE_API_URL", DEFAULT_COMMERCE_API_URL)
                .trim_end_matches('/')
                .to_string(),
            gemini,
            port,
            registration_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
