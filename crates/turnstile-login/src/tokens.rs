//! HS256 token minting for service calls and caller sessions.
//!
//! # Design
//! - The signing key is injected at construction; nothing reads it globally.
//! - Issue time is an argument so output is deterministic for a given input.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::User;

/// Scope granted to service tokens sent to the user directory.
pub const SERVICE_SCOPE: &str = "read";

const SESSION_LIFETIME_HOURS: i64 = 72;
const SERVICE_LIFETIME_SECS: i64 = 60;

/// Errors raised while minting or verifying tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The signing key was empty.
    #[error("signing secret must not be empty")]
    EmptySecret,
    /// The JWT library refused to sign the claims.
    #[error("failed to sign token")]
    Signing {
        /// Underlying JWT error.
        source: jsonwebtoken::errors::Error,
    },
    /// A presented token failed validation.
    #[error("token failed validation")]
    Invalid {
        /// Underlying JWT error.
        source: jsonwebtoken::errors::Error,
    },
}

/// Claims carried by a service-to-service token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceClaims {
    /// User the lookup is performed for.
    pub username: String,
    /// Granted scope.
    pub scope: String,
    /// Expiry as seconds since the Unix epoch.
    pub exp: i64,
}

/// Claims carried by a caller session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Login name.
    pub username: String,
    /// Given name.
    pub firstname: String,
    /// Family name.
    pub lastname: String,
    /// Role label.
    pub role: String,
    /// Expiry as seconds since the Unix epoch.
    pub exp: i64,
}

/// Signs HS256 tokens with a fixed key.
#[derive(Clone)]
pub struct TokenMinter {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl fmt::Debug for TokenMinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenMinter").finish_non_exhaustive()
    }
}

impl TokenMinter {
    /// Build a minter for `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::EmptySecret`] for an empty key.
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }

    /// Sign arbitrary claims.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if the claims cannot be encoded.
    pub fn mint<C: Serialize>(&self, claims: &C) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|source| TokenError::Signing { source })
    }

    /// Mint the short-lived token attached to directory lookups.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if signing fails.
    pub fn mint_service_token(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.mint(&ServiceClaims {
            username: username.to_string(),
            scope: SERVICE_SCOPE.to_string(),
            exp: (now + TimeDelta::seconds(SERVICE_LIFETIME_SECS)).timestamp(),
        })
    }

    /// Mint the session token returned to a caller after a successful login.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if signing fails.
    pub fn mint_session_token(&self, user: &User, now: DateTime<Utc>) -> Result<String, TokenError> {
        self.mint(&SessionClaims {
            username: user.username.clone(),
            firstname: user.first_name.clone(),
            lastname: user.last_name.clone(),
            role: user.role.clone(),
            exp: (now + TimeDelta::hours(SESSION_LIFETIME_HOURS)).timestamp(),
        })
    }

    /// Decode and validate a session token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Invalid`] for bad signatures, expired tokens, or
    /// malformed claims.
    pub fn verify_session_token(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.verify(token)
    }

    /// Decode and validate a service token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Invalid`] for bad signatures, expired tokens, or
    /// malformed claims.
    pub fn verify_service_token(&self, token: &str) -> Result<ServiceClaims, TokenError> {
        self.verify(token)
    }

    fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, TokenError> {
        jsonwebtoken::decode::<C>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|source| TokenError::Invalid { source })
    }
}
