use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub database: DatabaseConfig,
    /// OTLP collector endpoint. Span export is disabled when unset.
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!(
                "Invalid store backend: {}. Must be one of: postgres, memory",
                other
            )),
        }
    }
}

impl SessionConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let backend: StoreBackend = get_env(
            "SESSION_STORE_BACKEND",
            if is_prod { None } else { Some("memory") },
            is_prod,
        )?
        .parse()
        .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let url = match backend {
            StoreBackend::Postgres => Some(get_env("DATABASE_URL", None, is_prod)?),
            StoreBackend::Memory => env::var("DATABASE_URL").ok(),
        };

        Ok(SessionConfig {
            common: common_config,
            database: DatabaseConfig {
                backend,
                url,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 1)?,
                run_migrations: parse_env("DATABASE_RUN_MIGRATIONS", true)?,
            },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
        })
    }

    /// Configuration for an in-process instance on a random port.
    pub fn in_memory() -> Self {
        SessionConfig {
            common: core_config::Config {
                port: 0,
                ..Default::default()
            },
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                url: None,
                max_connections: 1,
                min_connections: 0,
                run_migrations: false,
            },
            otlp_endpoint: None,
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val.parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, e))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_known_values() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("Postgres".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert!("mongodb".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn in_memory_config_binds_random_port() {
        let config = SessionConfig::in_memory();
        assert_eq!(config.common.port, 0);
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert!(config.otlp_endpoint.is_none());
    }
}
