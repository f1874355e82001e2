//! Auth gateway configuration.
//!
//! Configuration is loaded from environment variables. The client secret is
//! redacted in Debug output.

use crate::auth::jwt::{cognito_issuer, cognito_jwks_url};
use crate::auth::KeyCacheConfig;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default prefix for the versioned user API.
pub const DEFAULT_API_PREFIX: &str = "/api/v1";

/// Default browser origin allowed by CORS (local frontend dev server).
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

/// Default JWKS cache TTL in seconds (24 hours).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 86_400;

/// Default upper bound on serving a stale key set during a JWKS outage.
pub const DEFAULT_JWKS_MAX_STALE_SECONDS: u64 = 172_800;

/// Default minimum spacing between JWKS fetch attempts.
pub const DEFAULT_JWKS_MIN_REFRESH_SECONDS: u64 = 10;

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Maximum JWKS fetch timeout in seconds.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Default identity provider operation timeout in seconds.
pub const DEFAULT_IDP_TIMEOUT_SECONDS: u64 = 10;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Auth gateway configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// AWS region hosting the user pool.
    pub cognito_region: String,

    pub cognito_user_pool_id: String,

    pub cognito_client_id: String,

    /// App client secret. When set, client-side calls carry a secret hash.
    pub cognito_client_secret: Option<SecretString>,

    /// Override for the identity provider endpoint (local emulators, tests).
    pub cognito_endpoint_url: Option<String>,

    /// JWKS endpoint; derived from region and pool unless overridden.
    pub jwks_url: String,

    pub jwks_cache_ttl: Duration,

    pub jwks_fetch_timeout: Duration,

    /// How long a stale key set may be served while the JWKS endpoint fails.
    pub jwks_max_stale: Duration,

    pub jwks_min_refresh_interval: Duration,

    /// Tolerance for `iat` claims in the future.
    pub jwt_clock_skew: Duration,

    pub idp_timeout: Duration,

    /// Prefix for the user API (default: "/api/v1").
    pub api_prefix: String,

    /// Adds the `Secure` attribute to auth cookies.
    pub cookie_secure: bool,

    pub cors_allowed_origins: Vec<String>,

    pub log_format: LogFormat,

    /// Time to keep serving in-flight requests after a shutdown signal.
    pub drain_period: Duration,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("cognito_region", &self.cognito_region)
            .field("cognito_user_pool_id", &self.cognito_user_pool_id)
            .field("cognito_client_id", &self.cognito_client_id)
            .field(
                "cognito_client_secret",
                &self.cognito_client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("cognito_endpoint_url", &self.cognito_endpoint_url)
            .field("jwks_url", &self.jwks_url)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .field("jwks_max_stale", &self.jwks_max_stale)
            .field("jwks_min_refresh_interval", &self.jwks_min_refresh_interval)
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .field("idp_timeout", &self.idp_timeout)
            .field("api_prefix", &self.api_prefix)
            .field("cookie_secure", &self.cookie_secure)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("log_format", &self.log_format)
            .field("drain_period", &self.drain_period)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS configuration: {0}")]
    InvalidJwks(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl ConfigError {
    fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    match vars.get(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

fn optional(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .filter(|value| !value.trim().is_empty())
        .cloned()
}

/// Parse a whole number of seconds, falling back to `default` when unset.
fn seconds(vars: &HashMap<String, String>, name: &str, default: u64) -> Result<u64, ConfigError> {
    match vars.get(name) {
        Some(value_str) => value_str.trim().parse::<u64>().map_err(|e| {
            ConfigError::invalid(
                name,
                format!("must be a non-negative integer, got '{}': {}", value_str, e),
            )
        }),
        None => Ok(default),
    }
}

fn boolean(vars: &HashMap<String, String>, name: &str) -> Result<bool, ConfigError> {
    match vars.get(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if v == "true" || v == "1" => Ok(true),
        Some(v) if v == "false" || v == "0" || v.is_empty() => Ok(false),
        Some(v) => Err(ConfigError::invalid(
            name,
            format!("must be true or false, got '{}'", v),
        )),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = match (optional(vars, "BIND_ADDRESS"), optional(vars, "PORT")) {
            (Some(address), _) => address,
            (None, Some(port)) => {
                let port: u16 = port.trim().parse().map_err(|e| {
                    ConfigError::invalid("PORT", format!("must be a valid port, got '{}': {}", port, e))
                })?;
                format!("0.0.0.0:{}", port)
            }
            (None, None) => DEFAULT_BIND_ADDRESS.to_string(),
        };

        let cognito_region = required(vars, "COGNITO_REGION")?;
        let cognito_user_pool_id = required(vars, "COGNITO_USER_POOL_ID")?;
        let cognito_client_id = required(vars, "COGNITO_CLIENT_ID")?;
        let cognito_client_secret = optional(vars, "COGNITO_CLIENT_SECRET").map(SecretString::from);
        let cognito_endpoint_url = optional(vars, "COGNITO_ENDPOINT_URL");

        let jwks_url = optional(vars, "JWKS_URL")
            .unwrap_or_else(|| cognito_jwks_url(&cognito_region, &cognito_user_pool_id));

        let ttl = seconds(vars, "JWKS_CACHE_TTL_SECONDS", DEFAULT_JWKS_CACHE_TTL_SECONDS)?;
        if ttl == 0 {
            return Err(ConfigError::InvalidJwks(
                "JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
            ));
        }

        let fetch_timeout = seconds(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
        )?;
        if fetch_timeout == 0 || fetch_timeout > MAX_JWKS_FETCH_TIMEOUT_SECONDS {
            return Err(ConfigError::InvalidJwks(format!(
                "JWKS_FETCH_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                MAX_JWKS_FETCH_TIMEOUT_SECONDS, fetch_timeout
            )));
        }

        let max_stale = seconds(vars, "JWKS_MAX_STALE_SECONDS", DEFAULT_JWKS_MAX_STALE_SECONDS)?;
        if max_stale < ttl {
            return Err(ConfigError::InvalidJwks(format!(
                "JWKS_MAX_STALE_SECONDS ({}) must not be less than JWKS_CACHE_TTL_SECONDS ({})",
                max_stale, ttl
            )));
        }

        let min_refresh = seconds(
            vars,
            "JWKS_MIN_REFRESH_SECONDS",
            DEFAULT_JWKS_MIN_REFRESH_SECONDS,
        )?;

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.trim().parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value.unsigned_abs() > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value.unsigned_abs())
        } else {
            DEFAULT_CLOCK_SKEW
        };

        let idp_timeout = seconds(vars, "IDP_TIMEOUT_SECONDS", DEFAULT_IDP_TIMEOUT_SECONDS)?;
        if idp_timeout == 0 {
            return Err(ConfigError::invalid(
                "IDP_TIMEOUT_SECONDS",
                "must be greater than 0",
            ));
        }

        let api_prefix = optional(vars, "API_PREFIX")
            .unwrap_or_else(|| DEFAULT_API_PREFIX.to_string());
        if !api_prefix.starts_with('/') {
            return Err(ConfigError::invalid(
                "API_PREFIX",
                format!("must start with '/', got '{}'", api_prefix),
            ));
        }
        let api_prefix = api_prefix.trim_end_matches('/').to_string();

        let cookie_secure = boolean(vars, "COOKIE_SECURE")?;

        let cors_allowed_origins: Vec<String> = optional(vars, "CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        let log_format = match optional(vars, "LOG_FORMAT")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::invalid(
                    "LOG_FORMAT",
                    format!("must be 'text' or 'json', got '{}'", other),
                ))
            }
        };

        let drain_period = Duration::from_secs(seconds(vars, "DRAIN_SECONDS", 0)?);

        Ok(Config {
            bind_address,
            cognito_region,
            cognito_user_pool_id,
            cognito_client_id,
            cognito_client_secret,
            cognito_endpoint_url,
            jwks_url,
            jwks_cache_ttl: Duration::from_secs(ttl),
            jwks_fetch_timeout: Duration::from_secs(fetch_timeout),
            jwks_max_stale: Duration::from_secs(max_stale),
            jwks_min_refresh_interval: Duration::from_secs(min_refresh),
            jwt_clock_skew,
            idp_timeout: Duration::from_secs(idp_timeout),
            api_prefix,
            cookie_secure,
            cors_allowed_origins,
            log_format,
            drain_period,
        })
    }

    /// Expected `iss` claim for access tokens from the configured pool.
    pub fn issuer(&self) -> String {
        cognito_issuer(&self.cognito_region, &self.cognito_user_pool_id)
    }

    pub fn key_cache_config(&self) -> KeyCacheConfig {
        KeyCacheConfig {
            ttl: self.jwks_cache_ttl,
            max_stale: self.jwks_max_stale,
            min_refresh_interval: self.jwks_min_refresh_interval,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            ("COGNITO_REGION".to_string(), "us-east-1".to_string()),
            (
                "COGNITO_USER_POOL_ID".to_string(),
                "us-east-1_AbCdEf".to_string(),
            ),
            ("COGNITO_CLIENT_ID".to_string(), "client-123".to_string()),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.cognito_region, "us-east-1");
        assert_eq!(config.cognito_user_pool_id, "us-east-1_AbCdEf");
        assert_eq!(config.cognito_client_id, "client-123");
        assert!(config.cognito_client_secret.is_none());
        assert!(config.cognito_endpoint_url.is_none());
        assert_eq!(
            config.jwks_url,
            "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_AbCdEf/.well-known/jwks.json"
        );
        assert_eq!(config.jwks_cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.jwks_fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.jwks_max_stale, Duration::from_secs(172_800));
        assert_eq!(config.jwks_min_refresh_interval, Duration::from_secs(10));
        assert_eq!(config.jwt_clock_skew, DEFAULT_CLOCK_SKEW);
        assert_eq!(config.idp_timeout, Duration::from_secs(10));
        assert_eq!(config.api_prefix, "/api/v1");
        assert!(!config.cookie_secure);
        assert_eq!(config.cors_allowed_origins, vec![DEFAULT_CORS_ORIGIN]);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.drain_period, Duration::ZERO);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("COGNITO_CLIENT_SECRET".to_string(), "s3cr3t".to_string());
        vars.insert(
            "COGNITO_ENDPOINT_URL".to_string(),
            "http://localhost:9229".to_string(),
        );
        vars.insert(
            "JWKS_URL".to_string(),
            "http://localhost:9229/jwks.json".to_string(),
        );
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "600".to_string());
        vars.insert("JWKS_MAX_STALE_SECONDS".to_string(), "1200".to_string());
        vars.insert("JWKS_MIN_REFRESH_SECONDS".to_string(), "0".to_string());
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "120".to_string());
        vars.insert("API_PREFIX".to_string(), "/api/v2/".to_string());
        vars.insert("COOKIE_SECURE".to_string(), "true".to_string());
        vars.insert(
            "CORS_ALLOWED_ORIGINS".to_string(),
            "https://app.example.com, https://admin.example.com".to_string(),
        );
        vars.insert("LOG_FORMAT".to_string(), "json".to_string());
        vars.insert("DRAIN_SECONDS".to_string(), "5".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(
            config
                .cognito_client_secret
                .as_ref()
                .map(|s| s.expose_secret().to_string()),
            Some("s3cr3t".to_string())
        );
        assert_eq!(
            config.cognito_endpoint_url.as_deref(),
            Some("http://localhost:9229")
        );
        assert_eq!(config.jwks_url, "http://localhost:9229/jwks.json");
        assert_eq!(config.jwks_cache_ttl, Duration::from_secs(600));
        assert_eq!(config.jwks_max_stale, Duration::from_secs(1200));
        assert_eq!(config.jwks_min_refresh_interval, Duration::ZERO);
        assert_eq!(config.jwt_clock_skew, Duration::from_secs(120));
        assert_eq!(config.api_prefix, "/api/v2");
        assert!(config.cookie_secure);
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://app.example.com", "https://admin.example.com"]
        );
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.drain_period, Duration::from_secs(5));
    }

    #[test]
    fn test_port_fallback() {
        let mut vars = base_vars();
        vars.insert("PORT".to_string(), "3000".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000");

        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9000");
    }

    #[test]
    fn test_from_vars_missing_required() {
        for name in [
            "COGNITO_REGION",
            "COGNITO_USER_POOL_ID",
            "COGNITO_CLIENT_ID",
        ] {
            let mut vars = base_vars();
            vars.remove(name);

            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == name),
                "{name}"
            );
        }
    }

    #[test]
    fn test_issuer_and_cache_config() {
        let mut vars = base_vars();
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "60".to_string());
        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(
            config.issuer(),
            "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_AbCdEf"
        );
        let cache = config.key_cache_config();
        assert_eq!(cache.ttl, Duration::from_secs(60));
        assert_eq!(cache.max_stale, Duration::from_secs(172_800));
    }

    #[test]
    fn test_jwt_clock_skew_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must be positive"))
        );
    }

    #[test]
    fn test_jwt_clock_skew_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "601".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must not exceed 600"))
        );
    }

    #[test]
    fn test_jwt_clock_skew_accepts_max() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "600".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.jwt_clock_skew, Duration::from_secs(600));
    }

    #[test]
    fn test_jwt_clock_skew_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert(
            "JWT_CLOCK_SKEW_SECONDS".to_string(),
            "five-minutes".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must be a valid integer"))
        );
    }

    #[test]
    fn test_jwks_ttl_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "0".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidJwks(_))
        ));
    }

    #[test]
    fn test_jwks_fetch_timeout_bounds() {
        for value in ["0", "61"] {
            let mut vars = base_vars();
            vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), value.to_string());

            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidJwks(ref msg)) if msg.contains("between 1 and 60")),
                "{value}"
            );
        }

        let mut vars = base_vars();
        vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "60".to_string());
        assert_eq!(
            Config::from_vars(&vars).unwrap().jwks_fetch_timeout,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_max_stale_must_cover_ttl() {
        let mut vars = base_vars();
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "3600".to_string());
        vars.insert("JWKS_MAX_STALE_SECONDS".to_string(), "60".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwks(msg)) if msg.contains("must not be less than"))
        );
    }

    #[test]
    fn test_rejects_malformed_values() {
        for (name, value) in [
            ("JWKS_CACHE_TTL_SECONDS", "a day"),
            ("IDP_TIMEOUT_SECONDS", "0"),
            ("API_PREFIX", "api/v1"),
            ("COOKIE_SECURE", "maybe"),
            ("LOG_FORMAT", "xml"),
            ("DRAIN_SECONDS", "-1"),
            ("PORT", "http"),
        ] {
            let mut vars = base_vars();
            vars.insert(name.to_string(), value.to_string());

            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidValue { name: ref n, .. }) if n == name),
                "{name}={value}: {result:?}"
            );
        }
    }

    #[test]
    fn test_debug_redacts_client_secret() {
        let mut vars = base_vars();
        vars.insert(
            "COGNITO_CLIENT_SECRET".to_string(),
            "super-secret-value".to_string(),
        );
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-value"));
    }
}
