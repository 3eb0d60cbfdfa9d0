//! Configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `DATABASE_URL` | Yes | - | Sea-ORM connection string |
//! | `SESSION_NAME` | No | `session` | Cookie name |
//! | `SESSION_PATH` | No | `/` | Cookie path |
//! | `SESSION_DOMAIN` | No | - | Cookie domain |
//! | `SESSION_DURATION` | No | `24h` | Session and CSRF token lifetime |
//! | `SESSION_HTTP_ONLY` | No | `true` | Cookie `HttpOnly` flag |
//! | `SESSION_SECURE` | No | `true` | Cookie `Secure` flag |
//! | `SESSION_SAME_SITE` | No | `lax` | `default`, `lax`, `strict` or `none` |
//! | `SESSION_CLEANUP_INTERVAL` | No | `5m` | Evictor period, `0` disables it |
//! | `AUTH_MIN_PASSWORD_LENGTH` | No | `13` | Minimum password length on register |
//! | `AUTH_SUPER_ADMIN_ID` | No | `1` | User allowed to force other users out |
//! | `AUTH_ARGON2_MEMORY_KIB` | No | `19456` | Argon2 memory cost |
//! | `AUTH_ARGON2_ITERATIONS` | No | `2` | Argon2 time cost |
//! | `AUTH_ARGON2_PARALLELISM` | No | `1` | Argon2 lanes |
//!
//! Durations use humantime syntax (`30s`, `5m`, `24h`, `7days`).

use std::env;
use std::str::FromStr;

use argon2::Params;
use thiserror::Error;

use crate::error::PasswordError;
use crate::evictor::DEFAULT_CLEANUP_INTERVAL;
use crate::password::Argon2Hasher;

const DEFAULT_SESSION_LIFETIME: time::Duration = time::Duration::hours(24);
const DEFAULT_MIN_PASSWORD_LENGTH: usize = 13;
const DEFAULT_SUPER_ADMIN_ID: i64 = 1;

/// Errors that can occur when parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid format for {var}: {message}")]
    InvalidFormat { var: String, message: String },
}

/// Cookie `SameSite` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    /// Leave the attribute off and let the browser decide.
    Default,
    #[default]
    Lax,
    Strict,
    None,
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "" | "lax" => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            "none" => Ok(Self::None),
            other => Err(format!("unknown SameSite mode '{other}'")),
        }
    }
}

/// Session cookie and lifetime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub name: String,
    pub path: String,
    pub domain: Option<String>,
    /// Lifetime of a session from creation or rotation, and of CSRF tokens.
    pub lifetime: time::Duration,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    /// Evictor period. Zero disables background eviction.
    pub cleanup_interval: std::time::Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "session".to_string(),
            path: "/".to_string(),
            domain: None,
            lifetime: DEFAULT_SESSION_LIFETIME,
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

/// Policy and hashing settings for [`AuthService`](crate::AuthService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub min_password_length: usize,
    /// The only user allowed to force-logout others. A placeholder until a
    /// role model exists.
    pub super_admin_id: i64,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            super_admin_id: DEFAULT_SUPER_ADMIN_ID,
            argon2_memory_kib: Params::DEFAULT_M_COST,
            argon2_iterations: Params::DEFAULT_T_COST,
            argon2_parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl AuthConfig {
    /// Builds the password hasher for these cost parameters.
    pub fn hasher(&self) -> Result<Argon2Hasher, PasswordError> {
        Argon2Hasher::new(
            self.argon2_memory_kib,
            self.argon2_iterations,
            self.argon2_parallelism,
        )
    }
}

/// Full configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub session: SessionConfig,
    pub auth: AuthConfig,
}

impl Config {
    /// Parse configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `DATABASE_URL` is missing or a variable has an
    /// invalid format.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Parse configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            name: lookup("SESSION_NAME").unwrap_or(defaults.name),
            path: lookup("SESSION_PATH").unwrap_or(defaults.path),
            domain: lookup("SESSION_DOMAIN").filter(|v| !v.is_empty()),
            lifetime: match lookup("SESSION_DURATION") {
                Some(v) => parse_lifetime("SESSION_DURATION", &v)?,
                None => defaults.lifetime,
            },
            http_only: parse_var(&lookup, "SESSION_HTTP_ONLY", defaults.http_only)?,
            secure: parse_var(&lookup, "SESSION_SECURE", defaults.secure)?,
            same_site: parse_var(&lookup, "SESSION_SAME_SITE", defaults.same_site)?,
            cleanup_interval: match lookup("SESSION_CLEANUP_INTERVAL") {
                Some(v) => parse_duration("SESSION_CLEANUP_INTERVAL", &v)?,
                None => defaults.cleanup_interval,
            },
        };

        let defaults = AuthConfig::default();
        let auth = AuthConfig {
            min_password_length: parse_var(
                &lookup,
                "AUTH_MIN_PASSWORD_LENGTH",
                defaults.min_password_length,
            )?,
            super_admin_id: parse_var(&lookup, "AUTH_SUPER_ADMIN_ID", defaults.super_admin_id)?,
            argon2_memory_kib: parse_var(
                &lookup,
                "AUTH_ARGON2_MEMORY_KIB",
                defaults.argon2_memory_kib,
            )?,
            argon2_iterations: parse_var(
                &lookup,
                "AUTH_ARGON2_ITERATIONS",
                defaults.argon2_iterations,
            )?,
            argon2_parallelism: parse_var(
                &lookup,
                "AUTH_ARGON2_PARALLELISM",
                defaults.argon2_parallelism,
            )?,
        };

        if session.lifetime <= time::Duration::ZERO {
            return Err(ConfigError::InvalidFormat {
                var: "SESSION_DURATION".to_string(),
                message: "must be positive".to_string(),
            });
        }

        Ok(Self {
            database_url,
            session,
            auth,
        })
    }
}

/// Parse an optional variable with `FromStr`, falling back to `default`.
fn parse_var<F, T>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::InvalidFormat {
            var: var.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_duration(var: &str, value: &str) -> Result<std::time::Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidFormat {
        var: var.to_string(),
        message: e.to_string(),
    })
}

fn parse_lifetime(var: &str, value: &str) -> Result<time::Duration, ConfigError> {
    let duration = parse_duration(var, value)?;
    time::Duration::try_from(duration).map_err(|e| ConfigError::InvalidFormat {
        var: var.to_string(),
        message: e.to_string(),
    })
}
