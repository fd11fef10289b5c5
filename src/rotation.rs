//! # Refresh Rotation Policy
//!
//! Sliding-window expiry for sessions. A refresh request near the end of a
//! session's lifetime extends the session and replaces the refresh token;
//! requests with plenty of lifetime left touch nothing. Rotating only near
//! expiry keeps long-lived sessions alive under continued use without a
//! write on every request.

use chrono::{DateTime, Duration, Utc};

use crate::errors::{AuthError, AuthResult};
use crate::session::Session;

/// What a refresh request should do to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDecision {
    /// Session has ample lifetime left; no mutation, no new refresh token
    Keep,
    /// Rotation event: extend the session and issue a new refresh token
    Rotate { new_expiry: DateTime<Utc> },
}

/// Decides, from a session's remaining lifetime, whether refresh rotates
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    refresh_ttl: Duration,
    threshold: Duration,
}

impl RotationPolicy {
    pub fn new(refresh_ttl: Duration, threshold: Duration) -> Self {
        Self {
            refresh_ttl,
            threshold,
        }
    }

    /// Evaluate a session at `now`. Pure: the caller applies any `Rotate`
    /// decision through a conditional store update.
    pub fn evaluate(&self, session: &Session, now: DateTime<Utc>) -> AuthResult<RotationDecision> {
        if !session.is_valid(now) {
            return Err(AuthError::SessionExpired);
        }

        if session.remaining(now) <= self.threshold {
            Ok(RotationDecision::Rotate {
                new_expiry: now + self.refresh_ttl,
            })
        } else {
            Ok(RotationDecision::Keep)
        }
    }
}
