use std::str::FromStr;

use crate::error::ConfigError;

/// Read an env var, treating empty values as unset.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.trim().is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Read a required env var.
pub(crate) fn required_env(key: &str) -> Result<String, ConfigError> {
    optional_env(key)?.ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse an env var into `T`, falling back to `default` when unset.
pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key)? {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{}': {}", raw, e),
            }),
        None => Ok(default),
    }
}

pub(crate) fn parse_string_env(key: &str, default: &str) -> Result<String, ConfigError> {
    Ok(optional_env(key)?.unwrap_or_else(|| default.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_optional_env_uses_default_when_unset() {
        let value: u16 = parse_optional_env("REMOTEDOCKER_TEST_UNSET_PORT", 5000).unwrap();
        assert_eq!(value, 5000);
    }

    #[test]
    fn required_env_reports_missing_key() {
        let err = required_env("REMOTEDOCKER_TEST_DEFINITELY_UNSET").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "REMOTEDOCKER_TEST_DEFINITELY_UNSET"));
    }
}
