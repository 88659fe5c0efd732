//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use learnhub_learning::CapacityPolicy;

/// Signing secret used when none is configured outside production.
const DEV_JWT_SECRET: &str = "learnhub-insecure-development-secret-change-me";
const MIN_PRODUCTION_SECRET_LEN: usize = 32;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub bcrypt_cost: u32,
    pub capacity: CapacityPolicy,
    pub allow_admin_signup: bool,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("environment", &self.environment)
            .field("bind_addr", &self.bind_addr)
            .field("database", &self.database_url.as_ref().map(|_| "<configured>"))
            .field("database_max_connections", &self.database_max_connections)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_ttl", &self.jwt_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("capacity", &self.capacity)
            .field("allow_admin_signup", &self.allow_admin_signup)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = match get("LEARNHUB_ENV").as_deref() {
            None | Some("development") | Some("dev") => Environment::Development,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => {
                return Err(invalid("LEARNHUB_ENV", other, "expected development or production"));
            }
        };

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw
                .parse()
                .map_err(|e: std::net::AddrParseError| invalid("BIND_ADDR", &raw, &e.to_string()))?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let jwt_secret = match (get("JWT_SECRET"), environment) {
            (Some(secret), Environment::Production) if secret.len() < MIN_PRODUCTION_SECRET_LEN => {
                return Err(invalid(
                    "JWT_SECRET",
                    "<redacted>",
                    "must be at least 32 bytes in production",
                ));
            }
            (Some(secret), _) => secret,
            (None, Environment::Production) => return Err(ConfigError::Missing("JWT_SECRET")),
            (None, Environment::Development) => {
                warn!("JWT_SECRET not set; using an insecure development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let ttl_ms: u64 = parse_or("JWT_EXPIRATION_MS", get("JWT_EXPIRATION_MS"), 86_400_000)?;
        if ttl_ms < 1_000 {
            return Err(invalid("JWT_EXPIRATION_MS", &ttl_ms.to_string(), "must be at least 1000"));
        }

        let bcrypt_cost: u32 = parse_or("BCRYPT_COST", get("BCRYPT_COST"), 12)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(invalid("BCRYPT_COST", &bcrypt_cost.to_string(), "must be between 4 and 31"));
        }

        let database_max_connections: u32 =
            parse_or("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), 10)?;
        if database_max_connections == 0 {
            return Err(invalid("DATABASE_MAX_CONNECTIONS", "0", "must be positive"));
        }

        Ok(Self {
            environment,
            bind_addr,
            database_url: get("DATABASE_URL"),
            database_max_connections,
            jwt_secret,
            jwt_ttl: Duration::from_millis(ttl_ms),
            bcrypt_cost,
            capacity: CapacityPolicy::from_flag(parse_flag(
                "ENROLLMENT_ENFORCE_CAPACITY",
                get("ENROLLMENT_ENFORCE_CAPACITY"),
            )?),
            allow_admin_signup: parse_flag("ALLOW_ADMIN_SIGNUP", get("ALLOW_ADMIN_SIGNUP"))?,
        })
    }
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        Some(raw) => raw.parse().map_err(|e: T::Err| invalid(var, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn parse_flag(var: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(invalid(var, other, "expected a boolean")),
    }
}
