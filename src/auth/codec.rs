//! Signed, time-bounded bearer credentials.
//!
//! Tokens are HS256 JWTs carrying `{sub, iat, exp}`. Verification is a pure
//! function of the token, the signing key and the instant supplied by the
//! caller: the library's own wall-clock expiry check is disabled so that the
//! `*_at` variants are fully deterministic.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Wire claims.
///
/// `iat` is optional on the way in so that tokens minted by older tooling
/// (which only set `sub` and `exp`) still verify.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
    exp: i64,
}

/// A freshly issued token and the claims it encodes.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies bearer tokens with a process-wide signing key.
pub struct CredentialCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    default_ttl: Duration,
}

impl std::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCodec")
            .field("algorithm", &Algorithm::HS256)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl CredentialCodec {
    pub fn new(secret: &SecretString, default_ttl: Duration) -> Self {
        let key = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock in `verify_at`.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            validation,
            default_ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.secret, config.token_ttl)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a token for `subject`, valid for `ttl` (or the configured default).
    pub fn issue(&self, subject: &str, ttl: Option<Duration>) -> Result<IssuedToken, AuthError> {
        self.issue_at(subject, ttl, Utc::now())
    }

    /// Issue a token as of `now`.
    ///
    /// `expires_at` is always `now + ttl`. Timestamps are truncated to whole
    /// seconds, matching the JWT `NumericDate` encoding.
    pub fn issue_at(
        &self,
        subject: &str,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        if subject.is_empty() {
            return Err(AuthError::MissingSubject);
        }

        let ttl = ttl.unwrap_or(self.default_ttl);
        let ttl = TimeDelta::from_std(ttl)
            .map_err(|e| AuthError::Signing(format!("ttl out of range: {}", e)))?;

        let issued_at = from_timestamp(now.timestamp())?;
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Signing("expiry overflows the calendar".to_string()))?;

        let claims = Claims {
            sub: Some(subject.to_string()),
            iat: Some(issued_at.timestamp()),
            exp: expires_at.timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            subject: subject.to_string(),
            issued_at,
            expires_at,
        })
    }

    /// Verify a token against the current time and return its subject.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as of `now` and return its subject.
    ///
    /// A token is still valid at the exact second of its expiry.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError::Malformed(e.to_string()))?;
        let claims = data.claims;

        if now.timestamp() > claims.exp {
            return Err(AuthError::Expired);
        }

        match claims.sub {
            Some(sub) if !sub.is_empty() => Ok(sub),
            _ => Err(AuthError::MissingSubject),
        }
    }
}

fn from_timestamp(secs: i64) -> Result<DateTime<Utc>, AuthError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AuthError::Signing(format!("invalid timestamp {}", secs)))
}
