// src/config.rs
use std::time::Duration;
use thiserror::Error;

use crate::models::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub backend_url: Option<String>, // Demo mode with in-memory data when unset
    pub refresh_interval: Option<Duration>, // None disables auto-refresh
    pub request_timeout: Duration,
    pub page_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            backend_url: None,
            refresh_interval: Some(Duration::from_secs(30)),
            request_timeout: Duration::from_secs(10),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from any variable source, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("PARCEL_DESK_BIND") {
            config.bind_addr = v;
        }
        if let Some(v) = get("PARCEL_DESK_BACKEND_URL") {
            if !(v.starts_with("http://") || v.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    var: "PARCEL_DESK_BACKEND_URL",
                    value: v,
                    reason: "expected an http(s) URL".to_string(),
                });
            }
            config.backend_url = Some(v);
        }
        if let Some(v) = get("PARCEL_DESK_REFRESH_SECS") {
            let secs = parse_number("PARCEL_DESK_REFRESH_SECS", &v)?;
            config.refresh_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(v) = get("PARCEL_DESK_REQUEST_TIMEOUT_SECS") {
            let secs = parse_number("PARCEL_DESK_REQUEST_TIMEOUT_SECS", &v)?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "PARCEL_DESK_REQUEST_TIMEOUT_SECS",
                    value: v,
                    reason: "must be greater than zero".to_string(),
                });
            }
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = get("PARCEL_DESK_PAGE_SIZE") {
            let size = parse_number("PARCEL_DESK_PAGE_SIZE", &v)?;
            if size == 0 || size > MAX_PAGE_SIZE as u64 {
                return Err(ConfigError::InvalidValue {
                    var: "PARCEL_DESK_PAGE_SIZE",
                    value: v,
                    reason: format!("must be between 1 and {}", MAX_PAGE_SIZE),
                });
            }
            config.page_size = size as u32;
        }

        Ok(config)
    }
}

fn parse_number(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
