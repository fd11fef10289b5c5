//! # sentra
//!
//! Authentication and session-lifecycle subsystem: credential verification,
//! dual-token issuance with sliding-expiration rotation, server-side
//! sessions, TOTP multi-factor authentication, and rate-limited password
//! reset. Storage and email transport are trait seams; HTTP routing and
//! cookie mechanics live outside this crate.

pub mod account;
pub mod config;
pub mod credentials;
pub mod email;
pub mod errors;
pub mod mfa;
pub mod rotation;
pub mod service;
pub mod session;
pub mod throttle;
pub mod token;
pub mod verification;

pub use account::{Account, AccountRepository, MfaPreferences};
pub use config::{AuthConfig, ConfigValidationError};
pub use credentials::CredentialVerifier;
pub use email::{EmailTemplate, Notifier, SmtpNotifier};
pub use errors::{AuthError, AuthResult};
pub use mfa::{MfaManager, MfaSetup, TotpConfig};
pub use rotation::{RotationDecision, RotationPolicy};
pub use service::{
    AuthService, AuthenticatedSession, LoginOutcome, LoginRequest, RefreshedTokens,
    RegisterRequest, SessionInfo,
};
pub use session::{Session, SessionStore};
pub use throttle::PasswordResetThrottler;
pub use token::{
    AccessTokenPayload, RefreshTokenPayload, TokenCodec, ACCESS_TOKEN_COOKIE,
    REFRESH_TOKEN_COOKIE, REFRESH_TOKEN_PATH,
};
pub use verification::{VerificationCode, VerificationCodeStore, VerificationKind};
