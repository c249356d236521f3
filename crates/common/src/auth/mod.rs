//! Caller identity
//!
//! Provides:
//! - JWT token generation and validation
//! - The `Caller` extractor: an optional user identity for annotating
//!   results. Search is public, so a missing or invalid token yields an
//!   anonymous caller instead of a rejection.

use crate::config::AuthConfig;
use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

/// The requesting user, if any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, user_id: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthorized {
                    message: "Invalid token".to_string(),
                },
            })
    }
}

/// Token verification available to the `Caller` extractor. Without a secret
/// every caller is anonymous.
#[derive(Clone, Default)]
pub struct CallerVerifier(Option<Arc<JwtManager>>);

impl CallerVerifier {
    pub fn new(manager: Arc<JwtManager>) -> Self {
        Self(Some(manager))
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        match config.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => Self::new(Arc::new(JwtManager::new(secret, config.jwt_expiration_secs))),
            None => Self(None),
        }
    }

    /// Resolve a caller from an `Authorization` header value
    pub fn caller(&self, auth_header: Option<&str>) -> Caller {
        let (Some(manager), Some(token)) = (&self.0, auth_header.and_then(extract_bearer)) else {
            return Caller::anonymous();
        };

        match manager.validate_token(token) {
            Ok(claims) => Caller::user(claims.sub),
            Err(e) => {
                debug!(error = %e, "Ignoring unusable bearer token");
                Caller::anonymous()
            }
        }
    }
}

/// Extract the token from an `Authorization: Bearer` header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
}

/// Axum extractor for Caller
impl<S> FromRequestParts<S> for Caller
where
    CallerVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let verifier = CallerVerifier::from_ref(state);
        let header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok());
        Ok(verifier.caller(header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);
        let token = manager.generate_token("user-42").unwrap();
        let claims = manager.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user-42");
    }

    #[test]
    fn test_caller_resolution_never_rejects() {
        let manager = Arc::new(JwtManager::new("test_secret", 3600));
        let verifier = CallerVerifier::new(manager.clone());
        let token = manager.generate_token("user-42").unwrap();

        assert_eq!(verifier.caller(Some(&format!("Bearer {}", token))), Caller::user("user-42"));
        assert_eq!(verifier.caller(Some("Bearer garbage")), Caller::anonymous());
        assert_eq!(verifier.caller(None), Caller::anonymous());

        let other = JwtManager::new("other_secret", 3600).generate_token("user-42").unwrap();
        assert!(!verifier.caller(Some(&format!("Bearer {}", other))).is_authenticated());
    }

    #[test]
    fn test_no_secret_means_anonymous() {
        let verifier = CallerVerifier::from_config(&AuthConfig::default());
        assert_eq!(verifier.caller(Some("Bearer anything")), Caller::anonymous());
    }
}
