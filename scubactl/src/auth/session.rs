//! JWT access/refresh token creation and verification.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{api::models::users::CurrentUser, config::Config, errors::Error, types::UserId};

/// Distinguishes short-lived access tokens from long-lived refresh tokens.
/// A refresh token must never authenticate a normal API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// JWT claims for both token kinds
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,        // Subject (user ID)
    pub username: String,   // Username
    pub email: String,      // User email
    pub is_admin: bool,     // Admin flag
    pub token_use: TokenUse,
    pub exp: i64, // Expiration time
    pub iat: i64, // Issued at
}

impl SessionClaims {
    /// Create new claims for a user and token kind
    pub fn new(user: &CurrentUser, token_use: TokenUse, config: &Config) -> Self {
        let now = Utc::now();
        let expiry = match token_use {
            TokenUse::Access => config.auth.access_token_expiry,
            TokenUse::Refresh => config.auth.refresh_token_expiry,
        };
        let exp = now + expiry;

        Self {
            sub: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            token_use,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

impl From<SessionClaims> for CurrentUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username,
            email: claims.email,
            is_admin: claims.is_admin,
        }
    }
}

/// Create a short-lived access token for a user
pub fn create_access_token(user: &CurrentUser, config: &Config) -> Result<String, Error> {
    create_token(user, TokenUse::Access, config)
}

/// Create a long-lived refresh token for a user
pub fn create_refresh_token(user: &CurrentUser, config: &Config) -> Result<String, Error> {
    create_token(user, TokenUse::Refresh, config)
}

fn create_token(user: &CurrentUser, token_use: TokenUse, config: &Config) -> Result<String, Error> {
    let claims = SessionClaims::new(user, token_use, config);
    let key = EncodingKey::from_secret(config.jwt_secret()?.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Verify and decode a JWT, rejecting tokens of the wrong kind.
pub fn verify_token(token: &str, expected_use: TokenUse, config: &Config) -> Result<SessionClaims, Error> {
    let key = DecodingKey::from_secret(config.jwt_secret()?.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        // Client errors (401) - malformed tokens, invalid claims, expired tokens
        jsonwebtoken::errors::ErrorKind::InvalidToken
        | jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::ExpiredSignature
        | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_)
        | jsonwebtoken::errors::ErrorKind::InvalidIssuer
        | jsonwebtoken::errors::ErrorKind::InvalidAudience
        | jsonwebtoken::errors::ErrorKind::InvalidSubject
        | jsonwebtoken::errors::ErrorKind::ImmatureSignature
        | jsonwebtoken::errors::ErrorKind::Base64(_)
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },

        // Server errors (500) - key issues, internal failures
        _ => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },
    })?;

    if token_data.claims.token_use != expected_use {
        return Err(Error::Unauthenticated {
            message: Some("Wrong token type".to_string()),
        });
    }

    Ok(token_data.claims)
}
