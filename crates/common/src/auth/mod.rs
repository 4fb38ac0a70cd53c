//! Authentication utilities
//!
//! Provides:
//! - Verification of identity-provider access tokens (HS256 JWT)
//! - Token minting for local development and tests
//! - The `AuthContext` extractor that scopes every request to one user

use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Authenticated caller, available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Owner id every read and write is scoped by
    pub user_id: Uuid,

    /// The bearer credential exactly as presented
    pub access_token: String,

    /// Request ID for tracing
    pub request_id: String,
}

/// Access token claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl JwtClaims {
    /// Parse the subject as a user id
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::InvalidToken)
    }
}

/// JWT verifier (and minter) bound to the provider's shared secret
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    audience: String,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, audience: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            audience: audience.to_string(),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Mint an access token for a user
    pub fn generate_token(&self, user_id: Uuid, email: Option<String>) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            aud: Some(self.audience.clone()),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            email,
            role: Some("authenticated".to_string()),
        };

        self.encode_claims(&claims)
    }

    /// Sign arbitrary claims
    pub fn encode_claims(&self, claims: &JwtClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal {
                message: format!("Failed to generate token: {}", e)
            })
    }

    /// Validate and decode an access token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.audience.as_str()]);

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::ExpiredToken
                    }
                    _ => AppError::InvalidToken,
                }
            })
    }
}

/// Read claims without checking the signature.
///
/// Only for client-side session bookkeeping; the gateway always verifies.
pub fn decode_unverified(token: &str) -> Result<JwtClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;
    validation.validate_exp = false;

    decode::<JwtClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::InvalidToken)
}

/// Extract the token from a `Bearer` Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must be a Bearer token".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let claims = jwt.validate_token(token)?;
        let user_id = claims.user_id()?;

        Ok(AuthContext {
            user_id,
            access_token: token.to_string(),
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new("test_secret", "authenticated", 3600)
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = manager();
        let user_id = Uuid::new_v4();

        let token = manager.generate_token(user_id, Some("a@b.c".into())).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.email.as_deref(), Some("a@b.c"));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = manager().generate_token(Uuid::new_v4(), None).unwrap();
        let other = JwtManager::new("other_secret", "authenticated", 3600);
        assert!(matches!(other.validate_token(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_wrong_audience_is_invalid() {
        let token = JwtManager::new("test_secret", "anon", 3600)
            .generate_token(Uuid::new_v4(), None)
            .unwrap();
        assert!(matches!(manager().validate_token(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_expired_token() {
        let manager = manager();
        let past = Utc::now() - Duration::hours(2);
        let token = manager
            .encode_claims(&JwtClaims {
                sub: Uuid::new_v4().to_string(),
                aud: Some("authenticated".into()),
                exp: past.timestamp(),
                iat: past.timestamp() - 60,
                email: None,
                role: None,
            })
            .unwrap();

        assert!(matches!(manager.validate_token(&token), Err(AppError::ExpiredToken)));
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let manager = manager();
        let token = manager
            .encode_claims(&JwtClaims {
                sub: "not-a-uuid".into(),
                aud: Some("authenticated".into()),
                exp: (Utc::now() + Duration::hours(1)).timestamp(),
                iat: Utc::now().timestamp(),
                email: None,
                role: None,
            })
            .unwrap();

        let claims = manager.validate_token(&token).unwrap();
        assert!(matches!(claims.user_id(), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_decode_unverified_reads_subject() {
        let user_id = Uuid::new_v4();
        let token = manager().generate_token(user_id, None).unwrap();
        let claims = decode_unverified(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);

        assert!(decode_unverified("garbage").is_err());
    }
}
