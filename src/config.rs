// config.rs
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::models::usermodel::UserRole;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn optional(name: &'static str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default),
    }
}

/// Server settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub log_level: String,
    pub event_bus_capacity: usize,
    pub realtime_auth_timeout: Duration,
    pub db_max_connections: u32,
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET_KEY")?;

        let cors_origins = optional(
            "CORS_ORIGINS",
            "http://localhost:5173,http://localhost:8000",
        )
        .split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect();

        let event_bus_capacity = parsed("EVENT_BUS_CAPACITY", 1024usize)?;
        if event_bus_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "EVENT_BUS_CAPACITY",
                value: "0".to_string(),
            });
        }

        Ok(Config {
            database_url,
            jwt_secret,
            port: parsed("PORT", 8000u16)?,
            cors_origins,
            log_level: optional("LOG_LEVEL", "debug"),
            event_bus_capacity,
            realtime_auth_timeout: Duration::from_secs(parsed("REALTIME_AUTH_TIMEOUT_SECS", 10u64)?),
            db_max_connections: parsed("DB_MAX_CONNECTIONS", 20u32)?,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Config {
        Config {
            database_url: "postgres://localhost/jobtradesasa_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            port: 0,
            cors_origins: Vec::new(),
            log_level: "debug".to_string(),
            event_bus_capacity: 64,
            realtime_auth_timeout: Duration::from_secs(2),
            db_max_connections: 1,
        }
    }
}

/// Settings for the client session run by the `unread-watch` binary.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub token: String,
    pub user_id: Uuid,
    pub user_role: UserRole,
    pub log_level: String,
    pub poll_interval: Duration,
    pub reconnect_base: Duration,
    pub reconnect_max: Duration,
}

impl ClientConfig {
    pub fn init() -> Result<ClientConfig, ConfigError> {
        let api_url = optional("JOBTRADE_API_URL", "http://localhost:8000")
            .trim_end_matches('/')
            .to_string();
        let token = required("JOBTRADE_TOKEN")?;

        let raw_user_id = required("JOBTRADE_USER_ID")?;
        let user_id = Uuid::parse_str(raw_user_id.trim()).map_err(|_| ConfigError::Invalid {
            name: "JOBTRADE_USER_ID",
            value: raw_user_id.clone(),
        })?;

        let raw_role = required("JOBTRADE_USER_ROLE")?;
        let user_role = raw_role.trim().parse::<UserRole>().map_err(|_| ConfigError::Invalid {
            name: "JOBTRADE_USER_ROLE",
            value: raw_role.clone(),
        })?;

        let poll_secs = parsed("POLL_INTERVAL_SECS", 5u64)?.max(1);
        let reconnect_base = parsed("REALTIME_RECONNECT_BASE_MS", 500u64)?.max(1);
        let reconnect_max = parsed("REALTIME_RECONNECT_MAX_MS", 30_000u64)?.max(reconnect_base);

        Ok(ClientConfig {
            api_url,
            token,
            user_id,
            user_role,
            log_level: optional("LOG_LEVEL", "info"),
            poll_interval: Duration::from_secs(poll_secs),
            reconnect_base: Duration::from_millis(reconnect_base),
            reconnect_max: Duration::from_millis(reconnect_max),
        })
    }

    /// `ws://` / `wss://` endpoint of the realtime channel.
    pub fn realtime_url(&self) -> String {
        let base = if let Some(rest) = self.api_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.api_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.api_url.clone()
        };
        format!("{}/api/realtime", base)
    }
}
