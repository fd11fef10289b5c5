//! # Token Codec
//!
//! HS256 signing and verification for the two token kinds. Access and
//! refresh tokens carry distinct payloads, secrets, and lifetimes; every
//! verification failure (bad signature, wrong audience, expiry) collapses to
//! a single `TokenInvalid` error. Verification is pure and side-effect free.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::errors::{AuthError, AuthResult};

/// Audience tag carried by both token kinds
pub const TOKEN_AUDIENCE: &str = "user";

/// Cookie name the transport layer uses for access tokens
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
/// Cookie name the transport layer uses for refresh tokens
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
/// Fixed path the refresh cookie is scoped to; the boundary error handler
/// clears cookies against this path on failure
pub const REFRESH_TOKEN_PATH: &str = "/auth/refresh";

/// Decoded access token payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessTokenPayload {
    pub account_id: Uuid,
    pub session_id: Uuid,
}

/// Decoded refresh token payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTokenPayload {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    /// Account id
    sub: Uuid,
    /// Session id
    sid: Uuid,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshClaims {
    /// Session id
    sid: Uuid,
    aud: String,
    iat: i64,
    exp: i64,
}

// ==================
// Token Codec
// ==================

/// Signs and verifies access/refresh tokens
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_token_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    /// Sign a short-lived access token bound to an account and session.
    pub fn sign_access(&self, account_id: Uuid, session_id: Uuid) -> AuthResult<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: account_id,
            sid: session_id,
            aud: TOKEN_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .map_err(|e| AuthError::internal(format!("Token signing failed: {e}")))
    }

    /// Sign a long-lived refresh token bound to a session.
    pub fn sign_refresh(&self, session_id: Uuid) -> AuthResult<String> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sid: session_id,
            aud: TOKEN_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)
            .map_err(|e| AuthError::internal(format!("Token signing failed: {e}")))
    }

    /// Verify an access token. Any failure is `TokenInvalid`.
    pub fn verify_access(&self, token: &str) -> AuthResult<AccessTokenPayload> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &validation())
            .map_err(|_| AuthError::TokenInvalid)?;
        Ok(AccessTokenPayload {
            account_id: data.claims.sub,
            session_id: data.claims.sid,
        })
    }

    /// Verify a refresh token. Any failure is `TokenInvalid`.
    pub fn verify_refresh(&self, token: &str) -> AuthResult<RefreshTokenPayload> {
        let data = decode::<RefreshClaims>(token, &self.refresh_decoding, &validation())
            .map_err(|_| AuthError::TokenInvalid)?;
        Ok(RefreshTokenPayload {
            session_id: data.claims.sid,
        })
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[TOKEN_AUDIENCE]);
    validation
}
