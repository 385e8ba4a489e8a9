//! Configuration management for the sign-in server
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::auth::{
    AuthSettings, DEFAULT_CHALLENGE_TTL_SECONDS, DEFAULT_PURGE_INTERVAL_SECONDS,
    DEFAULT_SESSION_TTL_SECONDS,
};

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

// Upper bounds keep every derived timestamp inside chrono's range
const MAX_SESSION_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;
const MAX_CHALLENGE_TTL_SECONDS: i64 = 24 * 60 * 60;
const MAX_PURGE_INTERVAL_SECONDS: i64 = 24 * 60 * 60;
const MAX_CLOCK_SKEW_SECONDS: i64 = 60 * 60;
const MAX_STORE_TIMEOUT_MS: i64 = 60_000;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Current environment
    pub environment: Environment,

    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Database connection URL; in-memory stores are used when absent
    pub database_url: Option<String>,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// JWT secret for session token signing
    pub jwt_secret: String,

    /// Session token lifetime in seconds (default: 86400 = 24 hours)
    pub session_ttl_seconds: i64,

    /// Nonce lifetime in seconds (default: 600 = 10 minutes)
    pub auth_nonce_ttl_seconds: i64,

    /// Interval between expired-nonce sweeps in seconds (default: 300)
    pub nonce_purge_interval_seconds: u64,

    /// Domain sign-in messages must be bound to
    pub siwe_domain: String,

    /// Chain id to enforce, if any
    pub siwe_chain_id: Option<u64>,

    /// Tolerance applied to message expiration / not-before checks
    pub clock_skew_seconds: i64,

    /// Upper bound for a single storage call
    pub store_timeout: Duration,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .map(|s| Environment::from_str(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if database_url.is_none() && environment.is_production() {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
        }

        let db_max_connections = parse_var(&lookup, "DB_MAX_CONNECTIONS", 5u32)?;

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        // JWT and Auth configuration
        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if environment.is_production() => {
                return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()))
            }
            None => DEV_JWT_SECRET.to_string(),
        };

        let session_ttl_seconds =
            parse_var(&lookup, "SESSION_TTL_SECONDS", DEFAULT_SESSION_TTL_SECONDS)?;
        let auth_nonce_ttl_seconds =
            parse_var(&lookup, "AUTH_NONCE_TTL_SECONDS", DEFAULT_CHALLENGE_TTL_SECONDS)?;
        let nonce_purge_interval_seconds = parse_var(
            &lookup,
            "AUTH_NONCE_PURGE_INTERVAL_SECONDS",
            DEFAULT_PURGE_INTERVAL_SECONDS,
        )?;
        let clock_skew_seconds = parse_var(&lookup, "SIWE_CLOCK_SKEW_SECONDS", 0i64)?;
        let store_timeout_ms = parse_var(&lookup, "STORE_TIMEOUT_MS", 5000u64)?;

        require_within("SESSION_TTL_SECONDS", session_ttl_seconds, 1, MAX_SESSION_TTL_SECONDS)?;
        require_within(
            "AUTH_NONCE_TTL_SECONDS",
            auth_nonce_ttl_seconds,
            1,
            MAX_CHALLENGE_TTL_SECONDS,
        )?;
        require_within(
            "AUTH_NONCE_PURGE_INTERVAL_SECONDS",
            i64::try_from(nonce_purge_interval_seconds).unwrap_or(i64::MAX),
            1,
            MAX_PURGE_INTERVAL_SECONDS,
        )?;
        require_within(
            "STORE_TIMEOUT_MS",
            i64::try_from(store_timeout_ms).unwrap_or(i64::MAX),
            1,
            MAX_STORE_TIMEOUT_MS,
        )?;
        require_within(
            "SIWE_CLOCK_SKEW_SECONDS",
            clock_skew_seconds,
            0,
            MAX_CLOCK_SKEW_SECONDS,
        )?;

        let siwe_domain = lookup("SIWE_DOMAIN").unwrap_or_else(|| "localhost:3000".to_string());

        let siwe_chain_id = match lookup("SIWE_CHAIN_ID") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(format!("SIWE_CHAIN_ID must be an integer, got '{}'", raw))
            })?),
            None => None,
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS");

        Ok(Config {
            environment,
            host,
            port,
            database_url,
            db_max_connections,
            log_level,
            jwt_secret,
            session_ttl_seconds,
            auth_nonce_ttl_seconds,
            nonce_purge_interval_seconds,
            siwe_domain,
            siwe_chain_id,
            clock_skew_seconds,
            store_timeout: Duration::from_millis(store_timeout_ms),
            cors_allowed_origins,
        })
    }

    /// Get database URL (useful for logging masked version)
    pub fn database_url_masked(&self) -> String {
        let Some(database_url) = self.database_url.as_deref() else {
            return "<in-memory>".to_string();
        };

        // Mask password in database URL for logging
        if let Some(at_pos) = database_url.find('@') {
            if let Some(colon_pos) = database_url[..at_pos].rfind(':') {
                let prefix = &database_url[..colon_pos + 1];
                let suffix = &database_url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        database_url.to_string()
    }

    /// Sign-in protocol settings derived from this configuration
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            domain: self.siwe_domain.clone(),
            chain_id: self.siwe_chain_id,
            clock_skew: chrono::Duration::seconds(self.clock_skew_seconds),
            jwt_secret: self.jwt_secret.clone(),
            session_ttl: chrono::Duration::seconds(self.session_ttl_seconds),
            store_timeout: self.store_timeout,
        }
    }

    pub fn nonce_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.auth_nonce_ttl_seconds)
    }

    pub fn nonce_purge_interval(&self) -> Duration {
        Duration::from_secs(self.nonce_purge_interval_seconds)
    }

    /// Session cookies carry `Secure` outside development
    pub fn cookie_secure(&self) -> bool {
        self.environment != Environment::Development
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

fn require_within(key: &str, value: i64, min: i64, max: i64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be between {} and {}, got {}",
            key, min, max, value
        )));
    }
    Ok(())
}
