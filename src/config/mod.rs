//! Configuration for the gateway.
//!
//! Everything comes from environment variables. An optional `.env` in the
//! working directory is loaded first via dotenvy, which never overwrites
//! variables that are already set.

pub(crate) mod helpers;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::config::helpers::{parse_optional_env, parse_string_env, required_env};
use crate::error::ConfigError;

/// Minimum length of the token signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Default token lifetime: 30 days. Issued tokens cannot be revoked before they expire.
pub const DEFAULT_TOKEN_TTL_MINUTES: u64 = 43_200;

/// Main configuration.
#[derive(Debug)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub auth: AuthConfig,
    pub docker: DockerConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            gateway: GatewayConfig::resolve()?,
            auth: AuthConfig::resolve()?,
            docker: DockerConfig::resolve()?,
        })
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body (build contexts, compose files).
    pub max_upload_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}

impl GatewayConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let max_upload_mb: usize = parse_optional_env("REMOTEDOCKER_MAX_UPLOAD_MB", 512)?;
        Ok(Self {
            host: parse_string_env("REMOTEDOCKER_HOST", "127.0.0.1")?,
            port: parse_optional_env("REMOTEDOCKER_PORT", 5000)?,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }
}

/// Token signing settings.
pub struct AuthConfig {
    /// HS256 signing secret shared by the gateway and the issuance tool.
    pub secret: SecretString,
    /// Lifetime given to newly issued tokens unless the issuer overrides it.
    pub token_ttl: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

impl AuthConfig {
    pub fn new(secret: SecretString, token_ttl: Duration) -> Result<Self, ConfigError> {
        if secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidValue {
                key: "REMOTEDOCKER_SECRET_KEY".to_string(),
                message: format!("must be at least {} bytes", MIN_SECRET_LEN),
            });
        }
        Ok(Self { secret, token_ttl })
    }

    /// Load only the signing settings, for tools that never start the server.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::resolve()
    }

    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let secret = SecretString::from(required_env("REMOTEDOCKER_SECRET_KEY")?);
        let ttl_minutes: u64 =
            parse_optional_env("REMOTEDOCKER_TOKEN_TTL_MINUTES", DEFAULT_TOKEN_TTL_MINUTES)?;
        if ttl_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REMOTEDOCKER_TOKEN_TTL_MINUTES".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Self::new(secret, Duration::from_secs(ttl_minutes * 60))
    }
}

/// Docker daemon and CLI settings.
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Binary used for `docker compose` invocations. The daemon itself is
    /// reached through the local defaults (`DOCKER_HOST`, then the platform socket).
    pub binary: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }
}

impl DockerConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            binary: parse_string_env("REMOTEDOCKER_DOCKER_BIN", "docker")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_rejects_short_secret() {
        let result = AuthConfig::new(
            SecretString::from("too-short".to_string()),
            Duration::from_secs(60),
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn auth_config_debug_redacts_secret() {
        let config = AuthConfig::new(
            SecretString::from("0123456789abcdef0123456789abcdef".to_string()),
            Duration::from_secs(60),
        )
        .unwrap();
        let printed = format!("{:?}", config);
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains("0123456789abcdef"));
    }

    #[test]
    fn gateway_config_default() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_upload_bytes, 512 * 1024 * 1024);
    }
}
