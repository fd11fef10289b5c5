//! # Authentication Orchestrator
//!
//! Composes the credential verifier, token codec, session store, rotation
//! policy, MFA manager, and throttler into the register / login / refresh /
//! verify-email / forgot-password / reset-password / logout flows. Inputs
//! arrive already validated; business-rule violations leave as typed errors.

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::account::{normalize_email, Account, AccountRepository};
use crate::config::AuthConfig;
use crate::credentials::{hash_password, CredentialVerifier};
use crate::email::{EmailTemplate, Notifier};
use crate::errors::{AuthError, AuthResult};
use crate::mfa::{MfaManager, MfaSetup, TotpConfig};
use crate::rotation::{RotationDecision, RotationPolicy};
use crate::session::{Session, SessionStore};
use crate::throttle::PasswordResetThrottler;
use crate::token::{AccessTokenPayload, TokenCodec};
use crate::verification::{VerificationCode, VerificationCodeStore, VerificationKind};

/// Email-verification codes live for 45 minutes
const EMAIL_VERIFICATION_TTL_MINUTES: i64 = 45;
/// Password-reset codes live for one hour
const PASSWORD_RESET_TTL_HOURS: i64 = 1;

/// Validated registration input
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Validated login input
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub user_agent: Option<String>,
}

/// A freshly issued session with its token pair
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedSession {
    pub account: Account,
    pub session_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

/// Login either completes or pauses for the second factor
#[derive(Debug, Clone, Serialize)]
pub enum LoginOutcome {
    /// Credentials verified, tokens withheld until the TOTP code arrives
    MfaRequired { account: Account },
    Authenticated(Box<AuthenticatedSession>),
}

/// Result of a refresh call; `refresh_token` is present only on rotation
#[derive(Debug, Clone, Serialize)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// A session as presented to its owner
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    #[serde(flatten)]
    pub session: Session,
    pub is_current: bool,
}

// ==================
// Auth Service
// ==================

/// The authentication orchestrator
pub struct AuthService<A, S, V>
where
    A: AccountRepository,
    S: SessionStore,
    V: VerificationCodeStore,
{
    accounts: Arc<A>,
    sessions: Arc<S>,
    codes: Arc<V>,
    notifier: Arc<dyn Notifier>,
    verifier: CredentialVerifier<A>,
    codec: TokenCodec,
    rotation: RotationPolicy,
    throttler: PasswordResetThrottler<V>,
    mfa: MfaManager<A>,
    config: AuthConfig,
}

impl<A, S, V> AuthService<A, S, V>
where
    A: AccountRepository,
    S: SessionStore,
    V: VerificationCodeStore,
{
    pub fn new(
        config: AuthConfig,
        accounts: Arc<A>,
        sessions: Arc<S>,
        codes: Arc<V>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let totp_config = TotpConfig {
            issuer: config.totp_issuer.clone(),
            ..TotpConfig::default()
        };
        Self {
            verifier: CredentialVerifier::new(accounts.clone()),
            codec: TokenCodec::new(&config),
            rotation: RotationPolicy::new(config.refresh_token_ttl, config.rotation_threshold),
            throttler: PasswordResetThrottler::new(
                codes.clone(),
                config.reset_window,
                config.reset_max_attempts,
            ),
            mfa: MfaManager::new(accounts.clone(), totp_config),
            accounts,
            sessions,
            codes,
            notifier,
            config,
        }
    }

    /// Access to the MFA manager for setup/verify/revoke endpoints
    pub fn mfa(&self) -> &MfaManager<A> {
        &self.mfa
    }

    // ==================
    // Register
    // ==================

    /// Create an account and dispatch the verification email.
    ///
    /// If the email cannot be dispatched the account is NOT rolled back; the
    /// distinct `NotificationFailed` error tells the caller the primary
    /// action succeeded and the notification step can be retried.
    pub fn register(&self, request: RegisterRequest) -> AuthResult<Account> {
        let email = normalize_email(&request.email);
        if self.accounts.find_by_email(&email)?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = hash_password(&request.password)?;
        let account = self.accounts.create(Account::new(email, password_hash))?;

        let code = self.codes.create(VerificationCode::new(
            account.id,
            VerificationKind::EmailVerification,
            Duration::minutes(EMAIL_VERIFICATION_TTL_MINUTES),
        ))?;

        tracing::info!(account_id = %account.id, "account registered");

        let template = EmailTemplate::verify_email(
            &self.config.app_origin,
            &code.code,
            EMAIL_VERIFICATION_TTL_MINUTES,
        );
        if let Err(e) = self.notifier.send(&account.email, template) {
            tracing::warn!(account_id = %account.id, error = %e, "verification email failed");
            return Err(AuthError::NotificationFailed(e.to_string()));
        }

        Ok(account)
    }

    // ==================
    // Login
    // ==================

    /// Verify credentials and either issue a session or pause for MFA.
    pub fn login(&self, request: LoginRequest) -> AuthResult<LoginOutcome> {
        let account = self.verifier.verify(&request.email, &request.password)?;

        if account.mfa.enabled {
            tracing::info!(account_id = %account.id, "login pending MFA");
            return Ok(LoginOutcome::MfaRequired { account });
        }

        let issued = self.issue_session(account, request.user_agent)?;
        Ok(LoginOutcome::Authenticated(Box::new(issued)))
    }

    /// Second step of an MFA login: the code proves the second factor and a
    /// session is issued exactly as in the non-MFA path.
    pub fn verify_mfa_login(
        &self,
        email: &str,
        code: &str,
        user_agent: Option<String>,
    ) -> AuthResult<AuthenticatedSession> {
        let account = self
            .accounts
            .find_by_email(email)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !account.mfa.enabled {
            return Err(AuthError::validation(
                "mfa",
                "MFA is not enabled for this account",
            ));
        }

        if !self.mfa.verify_for_login(&account, code)? {
            tracing::warn!(account_id = %account.id, "MFA login code rejected");
            return Err(AuthError::MfaInvalidCode);
        }

        self.issue_session(account, user_agent)
    }

    fn issue_session(
        &self,
        account: Account,
        user_agent: Option<String>,
    ) -> AuthResult<AuthenticatedSession> {
        let session = self.sessions.create(Session::new(
            account.id,
            user_agent,
            self.config.refresh_token_ttl,
        ))?;

        let access_token = self.codec.sign_access(account.id, session.id)?;
        let refresh_token = self.codec.sign_refresh(session.id)?;

        tracing::info!(account_id = %account.id, session_id = %session.id, "session issued");

        Ok(AuthenticatedSession {
            account,
            session_id: session.id,
            access_token,
            refresh_token,
        })
    }

    // ==================
    // Refresh
    // ==================

    /// Mint a fresh access token; near expiry, also extend the session and
    /// rotate the refresh token.
    pub fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshedTokens> {
        let payload = self.codec.verify_refresh(refresh_token)?;
        let session = self
            .sessions
            .find_by_id(payload.session_id)?
            .ok_or(AuthError::SessionNotFound)?;

        let now = Utc::now();
        let new_refresh_token = match self.rotation.evaluate(&session, now)? {
            RotationDecision::Keep => None,
            RotationDecision::Rotate { new_expiry } => {
                // Conditional update keyed on the observed expiry: the loser
                // of a concurrent rotation gets no second refresh token.
                if self
                    .sessions
                    .extend_if(session.id, session.expired_at, new_expiry)?
                {
                    tracing::info!(session_id = %session.id, "session rotated");
                    Some(self.codec.sign_refresh(session.id)?)
                } else {
                    None
                }
            }
        };

        let access_token = self.codec.sign_access(session.account_id, session.id)?;
        Ok(RefreshedTokens {
            access_token,
            refresh_token: new_refresh_token,
        })
    }

    // ==================
    // Email Verification
    // ==================

    /// Redeem an email-verification code. Single-use: the code is deleted
    /// before success is returned.
    pub fn verify_email(&self, code: &str) -> AuthResult<Account> {
        let consumed = self
            .codes
            .consume(code, VerificationKind::EmailVerification, Utc::now())?
            .ok_or(AuthError::CodeNotFound)?;

        let mut account = self
            .accounts
            .find_by_id(consumed.account_id)?
            .ok_or(AuthError::AccountNotFound)?;

        account.email_verified = true;
        self.accounts.update(&account)?;

        tracing::info!(account_id = %account.id, "email verified");
        Ok(account)
    }

    // ==================
    // Password Reset
    // ==================

    /// Issue a throttled password-reset code and email it.
    pub fn forgot_password(&self, email: &str) -> AuthResult<()> {
        let account = self
            .accounts
            .find_by_email(email)?
            .ok_or(AuthError::AccountNotFound)?;

        let code = self
            .throttler
            .issue(account.id, Duration::hours(PASSWORD_RESET_TTL_HOURS))?;

        let template = EmailTemplate::password_reset(
            &self.config.app_origin,
            &code.code,
            code.expires_at.timestamp(),
        );
        self.notifier
            .send(&account.email, template)
            .map_err(|e| AuthError::internal(format!("Reset email dispatch failed: {e}")))?;

        tracing::info!(account_id = %account.id, "password reset issued");
        Ok(())
    }

    /// Redeem a reset code, replace the password, and revoke every session
    /// for the account so all devices must log in again.
    pub fn reset_password(&self, code: &str, new_password: &str) -> AuthResult<()> {
        let consumed = self
            .codes
            .consume(code, VerificationKind::PasswordReset, Utc::now())?
            .ok_or(AuthError::CodeNotFound)?;

        let mut account = self
            .accounts
            .find_by_id(consumed.account_id)?
            .ok_or(AuthError::AccountNotFound)?;

        account.password_hash = hash_password(new_password)?;
        self.accounts.update(&account)?;

        let revoked = self.sessions.delete_all_by_account(account.id)?;
        self.codes
            .delete_all_by_account(account.id, VerificationKind::PasswordReset)?;

        tracing::info!(account_id = %account.id, revoked, "password reset completed");
        Ok(())
    }

    // ==================
    // Logout & Introspection
    // ==================

    /// Delete the session bound to the caller's access token.
    pub fn logout(&self, access_token: Option<&str>) -> AuthResult<()> {
        let payload = self.authenticate(access_token)?;
        if !self.sessions.delete_by_id(payload.session_id)? {
            return Err(AuthError::SessionNotFound);
        }
        tracing::info!(session_id = %payload.session_id, "logged out");
        Ok(())
    }

    /// Verify an access token and confirm its account still exists; the
    /// boundary uses this to establish the request identity.
    pub fn authenticate(&self, access_token: Option<&str>) -> AuthResult<AccessTokenPayload> {
        let token = access_token.ok_or(AuthError::TokenNotFound)?;
        let payload = self.codec.verify_access(token)?;
        self.accounts
            .find_by_id(payload.account_id)?
            .ok_or(AuthError::TokenInvalid)?;
        Ok(payload)
    }

    /// All sessions for an account, with the caller's own marked current.
    pub fn list_sessions(
        &self,
        account_id: Uuid,
        current_session_id: Uuid,
    ) -> AuthResult<Vec<SessionInfo>> {
        let sessions = self.sessions.list_by_account(account_id)?;
        Ok(sessions
            .into_iter()
            .map(|session| SessionInfo {
                is_current: session.id == current_session_id,
                session,
            })
            .collect())
    }

    /// Resolve a session to its owning account.
    pub fn get_session(&self, session_id: Uuid) -> AuthResult<Account> {
        let session = self
            .sessions
            .find_by_id(session_id)?
            .ok_or(AuthError::SessionNotFound)?;
        self.accounts
            .find_by_id(session.account_id)?
            .ok_or(AuthError::AccountNotFound)
    }

    /// Delete one of the account's own sessions (explicit revoke).
    pub fn delete_session(&self, session_id: Uuid, account_id: Uuid) -> AuthResult<()> {
        let session = self
            .sessions
            .find_by_id(session_id)?
            .ok_or(AuthError::SessionNotFound)?;
        if session.account_id != account_id {
            // Foreign sessions are indistinguishable from missing ones
            return Err(AuthError::SessionNotFound);
        }
        self.sessions.delete_by_id(session_id)?;
        Ok(())
    }

    /// Begin MFA setup for an account (idempotent; see `MfaManager`).
    pub fn begin_mfa_setup(&self, account_id: Uuid) -> AuthResult<MfaSetup> {
        self.mfa.begin_setup(account_id)
    }

    /// Complete MFA setup with the code the authenticator produced.
    pub fn complete_mfa_setup(
        &self,
        account_id: Uuid,
        code: &str,
        secret: &str,
    ) -> AuthResult<()> {
        self.mfa.complete_setup(account_id, code, secret)
    }

    /// Disable MFA for an account.
    pub fn revoke_mfa(&self, account_id: Uuid) -> AuthResult<()> {
        self.mfa.revoke(account_id)
    }
}

// ==================
// Tests
// ==================
