//! # Password Reset Throttling
//!
//! Bounds reset-code issuance per account within a trailing window. The
//! window is re-evaluated on every call rather than bucketed, so throttling
//! self-heals continuously instead of resetting on a clock boundary.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::{AuthError, AuthResult};
use crate::verification::{VerificationCode, VerificationCodeStore, VerificationKind};

/// Rate limiter for password-reset code issuance
pub struct PasswordResetThrottler<V: VerificationCodeStore> {
    codes: Arc<V>,
    window: Duration,
    max_attempts: usize,
}

impl<V: VerificationCodeStore> PasswordResetThrottler<V> {
    pub fn new(codes: Arc<V>, window: Duration, max_attempts: usize) -> Self {
        Self {
            codes,
            window,
            max_attempts,
        }
    }

    /// Issue a new reset code unless the account already created
    /// `max_attempts` codes within the trailing window. The check and the
    /// insert are one store operation, so concurrent requests cannot
    /// together exceed the limit.
    pub fn issue(&self, account_id: Uuid, code_ttl: Duration) -> AuthResult<VerificationCode> {
        let window_start = Utc::now() - self.window;
        let code = VerificationCode::new(account_id, VerificationKind::PasswordReset, code_ttl);

        match self
            .codes
            .create_limited(code, window_start, self.max_attempts)?
        {
            Some(created) => Ok(created),
            None => {
                tracing::warn!(account_id = %account_id, "password reset throttled");
                Err(AuthError::RateLimitExceeded)
            }
        }
    }
}
