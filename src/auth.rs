//! Caller Authentication
//!
//! Operators and randomness providers present a JWT issued by an external
//! identity provider. The engine only validates tokens; it never issues them.
//! The `sub` claim is hashed into the caller's [`AccountId`], which the
//! access policy then checks for roles.

use std::collections::HashSet;

use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::game::state::AccountId;

/// Token validation settings.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// Required `iss`, any issuer when unset
    pub issuer: Option<String>,
    /// Required `aud`, unchecked when unset
    pub audience: Option<String>,
    /// RS256 public key (PEM). Takes precedence over `secret`.
    pub public_key_pem: Option<String>,
    /// HS256 shared secret
    pub secret: Option<String>,
    /// Accept expired tokens (local testing only)
    pub skip_expiry: bool,
}

impl AuthConfig {
    /// Read `KICKOFF_AUTH_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            issuer: std::env::var("KICKOFF_AUTH_ISSUER").ok(),
            audience: std::env::var("KICKOFF_AUTH_AUDIENCE").ok(),
            public_key_pem: std::env::var("KICKOFF_AUTH_PUBLIC_KEY_PEM").ok(),
            secret: std::env::var("KICKOFF_AUTH_SECRET").ok(),
            skip_expiry: std::env::var("KICKOFF_AUTH_SKIP_EXPIRY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// HS256 config with the given secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Self::default()
        }
    }

    /// Is a verification key present?
    pub fn is_configured(&self) -> bool {
        self.public_key_pem.is_some() || self.secret.is_some()
    }
}

/// Claims read from a caller token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerClaims {
    /// Subject, the provider's user id
    pub sub: String,
    /// Expiry (Unix seconds, 0 when absent)
    #[serde(default)]
    pub exp: u64,
    /// Issued at (Unix seconds)
    #[serde(default)]
    pub iat: u64,
    /// Issuer
    #[serde(default)]
    pub iss: Option<String>,
    /// Audience, string or list
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
}

impl CallerClaims {
    /// Account derived from the subject.
    pub fn account_id(&self) -> AccountId {
        account_for_subject(&self.sub)
    }
}

/// Map an identity-provider subject to an account.
pub fn account_for_subject(sub: &str) -> AccountId {
    let mut hasher = Sha256::new();
    hasher.update(b"kickoff-account:");
    hasher.update(sub.as_bytes());
    let hash = hasher.finalize();

    let mut id = [0u8; 16];
    id.copy_from_slice(&hash[..16]);
    AccountId::new(id)
}

/// Authentication failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No verification key configured
    #[error("authentication not configured")]
    NotConfigured,
    /// Malformed token
    #[error("invalid token format")]
    InvalidFormat,
    /// Signature did not verify
    #[error("invalid signature")]
    InvalidSignature,
    /// Past `exp`
    #[error("token expired")]
    Expired,
    /// `iss` mismatch
    #[error("invalid issuer")]
    InvalidIssuer,
    /// `aud` mismatch
    #[error("invalid audience")]
    InvalidAudience,
    /// Required claim absent or empty
    #[error("missing required claim: {0}")]
    MissingClaim(String),
    /// Any other decoding problem
    #[error("decode error: {0}")]
    Decode(String),
}

/// Validate a token and return its claims.
pub fn validate_token(token: &str, config: &AuthConfig) -> Result<CallerClaims, AuthError> {
    let (key, algorithm) = match (&config.public_key_pem, &config.secret) {
        (Some(pem), _) => {
            let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| AuthError::Decode(format!("invalid public key: {}", e)))?;
            (key, Algorithm::RS256)
        }
        (None, Some(secret)) => (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256),
        (None, None) => return Err(AuthError::NotConfigured),
    };

    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = !config.skip_expiry;
    match &config.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }
    if let Some(issuer) = &config.issuer {
        validation.set_issuer(&[issuer]);
    }

    let data: TokenData<CallerClaims> = decode(token, &key, &validation).map_err(map_jwt_error)?;
    let claims = data.claims;

    if claims.sub.is_empty() {
        return Err(AuthError::MissingClaim("sub".into()));
    }

    // jsonwebtoken allows leeway; enforce exp strictly when present
    if !config.skip_expiry && claims.exp > 0 {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        if now > claims.exp {
            return Err(AuthError::Expired);
        }
    }

    Ok(claims)
}

/// Validate a token and return the caller's account.
pub fn authenticate(token: &str, config: &AuthConfig) -> Result<AccountId, AuthError> {
    let claims = validate_token(token, config)?;
    let account = claims.account_id();
    tracing::debug!(account = %account.short(), "caller authenticated");
    Ok(account)
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) => AuthError::InvalidFormat,
        _ => AuthError::Decode(err.to_string()),
    }
}
