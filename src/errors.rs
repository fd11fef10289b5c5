//! # Authentication Errors
//!
//! Unified error taxonomy for the authentication subsystem.
//! Business-rule violations are constructed at the point of detection and
//! propagate unchanged to the boundary; collaborator failures are normalized
//! to `Internal`.

use thiserror::Error;

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Malformed input, surfaced with per-field detail
    #[error("Invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    /// Unknown email or wrong password; never distinguishes which
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Bad signature, wrong audience, or expired token; never distinguishes which
    #[error("Invalid or expired token")]
    TokenInvalid,

    /// The request carried no token at all
    #[error("Missing authentication token")]
    TokenNotFound,

    #[error("Session not found")]
    SessionNotFound,

    /// Terminal: the caller must re-authenticate
    #[error("Session expired")]
    SessionExpired,

    /// Retryable by the user
    #[error("Invalid MFA code")]
    MfaInvalidCode,

    #[error("An account already exists with this email")]
    EmailAlreadyExists,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Too many requests, please try again later")]
    RateLimitExceeded,

    /// Missing or expired verification/reset code
    #[error("Verification code not found or expired")]
    CodeNotFound,

    /// The primary mutation succeeded but the email could not be dispatched;
    /// reported distinctly so the caller can retry the notification step
    #[error("Notification dispatch failed: {0}")]
    NotificationFailed(String),

    /// Storage or collaborator failure; details are logged, never exposed
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::InvalidCredentials => "AUTH_INVALID_CREDENTIALS",
            Self::TokenInvalid => "AUTH_TOKEN_INVALID",
            Self::TokenNotFound => "AUTH_TOKEN_NOT_FOUND",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::MfaInvalidCode => "MFA_INVALID_CODE",
            Self::EmailAlreadyExists => "AUTH_EMAIL_ALREADY_EXISTS",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::CodeNotFound => "CODE_NOT_FOUND",
            Self::NotificationFailed(_) => "NOTIFICATION_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            // Collapsed to a generic unauthorized to avoid account enumeration
            Self::InvalidCredentials | Self::TokenInvalid | Self::TokenNotFound => 401,
            // Trigger cookie clearing at the boundary
            Self::SessionNotFound | Self::SessionExpired => 401,
            Self::MfaInvalidCode => 400,
            Self::EmailAlreadyExists => 400,
            Self::AccountNotFound => 404,
            Self::RateLimitExceeded => 429,
            Self::CodeNotFound => 404,
            Self::NotificationFailed(_) => 502,
            Self::Internal(_) => 500,
        }
    }
}
