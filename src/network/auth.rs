//! JWT Authentication
//!
//! Validates JWTs from external auth providers and maps the subject claim to
//! a ledger [`Address`]. The server does NOT issue tokens - only validates
//! them. A development mode accepts `dev:<label>` tokens without signature.

use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

use crate::core::address::Address;

/// Prefix for unsigned development tokens.
pub const DEV_TOKEN_PREFIX: &str = "dev:";

/// Authentication configuration.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// Expected issuer claim ("iss"). If None, any issuer accepted.
    pub issuer: Option<String>,
    /// Expected audience claim ("aud"). If None, any audience accepted.
    pub audience: Option<String>,
    /// RS256 public key in PEM format (preferred for external providers).
    pub public_key_pem: Option<String>,
    /// HS256 secret (fallback for simple setups).
    pub secret: Option<String>,
    /// Whether to skip expiry validation (for testing only).
    pub skip_expiry: bool,
    /// Accept `dev:<label>` tokens. Never enable in production.
    pub insecure_dev: bool,
    /// Contract addresses no token may act as.
    pub reserved: Vec<Address>,
}

impl AuthConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            issuer: std::env::var("WHEEL_AUTH_ISSUER").ok(),
            audience: std::env::var("WHEEL_AUTH_AUDIENCE").ok(),
            public_key_pem: std::env::var("WHEEL_AUTH_PUBLIC_KEY_PEM").ok(),
            secret: std::env::var("WHEEL_AUTH_SECRET").ok(),
            skip_expiry: env_flag("WHEEL_AUTH_SKIP_EXPIRY"),
            insecure_dev: env_flag("WHEEL_AUTH_INSECURE_DEV"),
            reserved: Vec::new(),
        }
    }

    /// Check if signature-verified authentication is configured.
    pub fn is_configured(&self) -> bool {
        self.public_key_pem.is_some() || self.secret.is_some()
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

/// Standard JWT claims we expect from auth providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: a hex address, or a provider user ID.
    pub sub: String,
    /// Expiry timestamp (Unix seconds).
    #[serde(default)]
    pub exp: u64,
    /// Issued at timestamp.
    #[serde(default)]
    pub iat: u64,
    /// Issuer (auth provider).
    #[serde(default)]
    pub iss: Option<String>,
    /// Audience.
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
}

impl TokenClaims {
    /// Account the subject acts as.
    ///
    /// A subject that is already a hex address is used directly; anything
    /// else is hashed into one.
    pub fn address(&self) -> Address {
        subject_address(&self.sub)
    }
}

/// Map a subject string to an account.
pub fn subject_address(sub: &str) -> Address {
    if let Some(addr) = Address::from_hex(sub) {
        return addr;
    }
    let mut hasher = Sha256::new();
    hasher.update(b"cipher-wheel-account:");
    hasher.update(sub.as_bytes());
    let hash = hasher.finalize();

    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::new(bytes)
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No authentication configured on server.
    #[error("authentication not configured")]
    NotConfigured,
    /// Token format is invalid.
    #[error("invalid token format")]
    InvalidFormat,
    /// Token signature verification failed.
    #[error("invalid signature")]
    InvalidSignature,
    /// Token has expired.
    #[error("token expired")]
    Expired,
    /// Issuer claim doesn't match expected value.
    #[error("invalid issuer")]
    InvalidIssuer,
    /// Audience claim doesn't match expected value.
    #[error("invalid audience")]
    InvalidAudience,
    /// Required claim is missing.
    #[error("missing required claim: {0}")]
    MissingClaim(String),
    /// Subject maps to the zero address.
    #[error("subject maps to the zero address")]
    ZeroAddress,
    /// Subject maps to a contract address.
    #[error("subject maps to contract address {0}")]
    ReservedAddress(Address),
    /// JWT decoding error.
    #[error("decode error: {0}")]
    DecodeError(String),
}

impl AuthError {
    /// Stable reason identifier for the wire.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotConfigured => "AuthNotConfigured",
            Self::InvalidFormat => "InvalidTokenFormat",
            Self::InvalidSignature => "InvalidSignature",
            Self::Expired => "TokenExpired",
            Self::InvalidIssuer => "InvalidIssuer",
            Self::InvalidAudience => "InvalidAudience",
            Self::MissingClaim(_) => "MissingClaim",
            Self::ZeroAddress => "ZeroAddress",
            Self::ReservedAddress(_) => "ReservedAddress",
            Self::DecodeError(_) => "TokenDecodeError",
        }
    }
}

/// Resolve a bearer token to the account it authenticates.
pub fn authenticate(token: &str, config: &AuthConfig) -> Result<Address, AuthError> {
    let address = match token.strip_prefix(DEV_TOKEN_PREFIX) {
        Some(label) if config.insecure_dev => {
            if label.is_empty() {
                return Err(AuthError::MissingClaim("sub".into()));
            }
            warn!(label, "accepting unsigned development token");
            subject_address(label)
        }
        _ => validate_token(token, config)?.address(),
    };
    if address.is_zero() {
        return Err(AuthError::ZeroAddress);
    }
    if config.reserved.contains(&address) {
        warn!(?address, "token subject is a contract address");
        return Err(AuthError::ReservedAddress(address));
    }
    Ok(address)
}

/// Validate a JWT token and extract claims.
pub fn validate_token(token: &str, config: &AuthConfig) -> Result<TokenClaims, AuthError> {
    if !config.is_configured() {
        return Err(AuthError::NotConfigured);
    }

    // Determine algorithm based on config
    let algorithm = if config.public_key_pem.is_some() {
        Algorithm::RS256
    } else {
        Algorithm::HS256
    };

    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims = std::collections::HashSet::new();

    if let Some(ref issuer) = config.issuer {
        validation.set_issuer(&[issuer]);
    }

    if let Some(ref audience) = config.audience {
        validation.set_audience(&[audience]);
    } else {
        validation.validate_aud = false;
    }

    if config.skip_expiry {
        validation.validate_exp = false;
    }

    let token_data: TokenData<TokenClaims> = if let Some(ref pem) = config.public_key_pem {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::DecodeError(format!("invalid public key: {}", e)))?;
        decode(token, &key, &validation).map_err(map_jwt_error)?
    } else if let Some(ref secret) = config.secret {
        let key = DecodingKey::from_secret(secret.as_bytes());
        decode(token, &key, &validation).map_err(map_jwt_error)?
    } else {
        return Err(AuthError::NotConfigured);
    };

    let claims = token_data.claims;

    if claims.sub.is_empty() {
        return Err(AuthError::MissingClaim("sub".into()));
    }

    // Manual expiry check (in case validation was skipped)
    if !config.skip_expiry && claims.exp > 0 {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        if now > claims.exp {
            return Err(AuthError::Expired);
        }
    }

    Ok(claims)
}

/// Map JWT library errors to our error type.
fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) => AuthError::InvalidFormat,
        _ => AuthError::DecodeError(err.to_string()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
