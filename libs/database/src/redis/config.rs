#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv};

/// Redis configuration
#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// Connection string, e.g. "redis://127.0.0.1:6379"
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[cfg(feature = "config")]
impl FromEnv for RedisConfig {
    /// Requires `REDIS_URL` (or legacy `REDIS_HOST`) to be set
    fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("REDIS_URL")
            .or_else(|_| std::env::var("REDIS_HOST"))
            .map_err(|_| ConfigError::MissingEnvVar("REDIS_URL or REDIS_HOST".to_string()))?;
        Ok(Self { url })
    }
}
