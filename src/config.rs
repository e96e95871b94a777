use std::env;

use tokio::time::Duration;

use crate::engine::retry::RetryPolicy;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub blob_base_url: String,
    pub store_max_attempts: u32,
    pub store_retry_base_ms: u64,
    pub store_retry_max_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") | Err(_) => LogFormat::Compact,
            Ok(other) => {
                return Err(AppError::Internal(format!(
                    "invalid LOG_FORMAT: {other}, expected compact or json"
                )));
            }
        };

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            blob_base_url: env::var("BLOB_BASE_URL")
                .unwrap_or_else(|_| "memory://blobs".to_string()),
            store_max_attempts: parse_or_default("STORE_MAX_ATTEMPTS", 3)?,
            store_retry_base_ms: parse_or_default("STORE_RETRY_BASE_MS", 100)?,
            store_retry_max_ms: parse_or_default("STORE_RETRY_MAX_MS", 2_000)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.store_max_attempts == 0 {
            return Err(AppError::Internal(
                "STORE_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        // tokio broadcast channels need room for at least one event.
        if self.event_buffer_size == 0 {
            return Err(AppError::Internal(
                "EVENT_BUFFER_SIZE must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.store_max_attempts,
            base_delay: Duration::from_millis(self.store_retry_base_ms),
            max_delay: Duration::from_millis(self.store_retry_max_ms),
            ..RetryPolicy::default()
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            event_buffer_size: 1024,
            blob_base_url: "memory://blobs".to_string(),
            store_max_attempts: 3,
            store_retry_base_ms: 100,
            store_retry_max_ms: 2_000,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn zero_event_buffer_is_rejected() {
        let config = Config {
            event_buffer_size: 0,
            ..config()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "internal error: EVENT_BUFFER_SIZE must be at least 1");
    }

    #[test]
    fn zero_store_attempts_are_rejected() {
        let config = Config {
            store_max_attempts: 0,
            ..config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn retry_policy_follows_settings() {
        let policy = Config {
            store_max_attempts: 5,
            store_retry_base_ms: 10,
            store_retry_max_ms: 50,
            ..config()
        }
        .retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(9), Duration::from_millis(50));
    }
}
