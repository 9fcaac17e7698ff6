use crate::domain::TierView;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Reject percentage allocations that do not sum to 100.
    pub strict_allocation: bool,
    /// Tier view for stored providers that have none recorded.
    pub default_tier_view: TierView,
    /// Number of projection results kept in memory; 0 disables caching.
    pub projection_cache_size: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let strict_allocation = match env_map
            .get("STRICT_ALLOCATION")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
            .unwrap_or("false")
        {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STRICT_ALLOCATION".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        let tier_view_raw = env_map
            .get("DEFAULT_TIER_VIEW")
            .map(|s| s.as_str())
            .unwrap_or("effective");
        let default_tier_view = TierView::parse(tier_view_raw).ok_or_else(|| {
            ConfigError::InvalidValue(
                "DEFAULT_TIER_VIEW".to_string(),
                format!("must be raw, effective, or billed, got {}", tier_view_raw),
            )
        })?;

        let projection_cache_size = env_map
            .get("PROJECTION_CACHE_SIZE")
            .map(|s| s.as_str())
            .unwrap_or("64")
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "PROJECTION_CACHE_SIZE".to_string(),
                    "must be a non-negative integer".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            strict_allocation,
            default_tier_view,
            projection_cache_size,
        })
    }
}
