//! # Email Notification
//!
//! Outbound email behind a `Notifier` trait. The flows only ever hand a
//! template to the notifier; transport failures surface as
//! `NotificationFailed` so callers can distinguish them from the primary
//! mutation failing.

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::sync::RwLock;

use crate::errors::{AuthError, AuthResult};

/// Messages the authentication flows can dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailTemplate {
    VerifyEmail {
        link: String,
        expires_minutes: i64,
    },
    PasswordReset {
        link: String,
    },
}

impl EmailTemplate {
    /// Email-verification message with a confirmation link.
    pub fn verify_email(origin: &str, code: &str, expires_minutes: i64) -> Self {
        Self::VerifyEmail {
            link: format!("{origin}/confirm-account?code={}", urlencoding::encode(code)),
            expires_minutes,
        }
    }

    /// Password-reset message. The link carries the expiry timestamp for
    /// client-side display only; the server re-validates independently.
    pub fn password_reset(origin: &str, code: &str, expires_at_unix: i64) -> Self {
        Self::PasswordReset {
            link: format!(
                "{origin}/reset-password?code={}&exp={expires_at_unix}",
                urlencoding::encode(code)
            ),
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Self::VerifyEmail { .. } => "Confirm your email address",
            Self::PasswordReset { .. } => "Reset your password",
        }
    }

    pub fn body(&self) -> String {
        match self {
            Self::VerifyEmail {
                link,
                expires_minutes,
            } => format!(
                "Confirm your email address by visiting the link below.\n\n{link}\n\n\
                 The link expires in {expires_minutes} minutes. If you did not create \
                 an account, you can ignore this message.",
            ),
            Self::PasswordReset { link } => format!(
                "A password reset was requested for your account.\n\n{link}\n\n\
                 If you did not request this, you can ignore this message and your \
                 password will stay unchanged.",
            ),
        }
    }
}

/// Outbound email dispatcher
pub trait Notifier: Send + Sync {
    fn send(&self, recipient: &str, template: EmailTemplate) -> AuthResult<()>;
}

// ==================
// SMTP Notifier
// ==================

/// SMTP-backed notifier
pub struct SmtpNotifier {
    transport: SmtpTransport,
    sender: Mailbox,
}

impl SmtpNotifier {
    pub fn new(
        relay: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        sender: Mailbox,
    ) -> AuthResult<Self> {
        let transport = SmtpTransport::relay(relay)
            .map_err(|e| AuthError::internal(format!("SMTP relay setup failed: {e}")))?
            .credentials(Credentials::new(username.into(), password.into()))
            .build();
        Ok(Self { transport, sender })
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, recipient: &str, template: EmailTemplate) -> AuthResult<()> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|_| AuthError::validation("email", "Not a valid email address"))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(template.subject())
            .body(template.body())
            .map_err(|e| AuthError::internal(format!("Email build failed: {e}")))?;

        self.transport
            .send(&message)
            .map_err(|e| AuthError::NotificationFailed(e.to_string()))?;
        Ok(())
    }
}

// ==================
// Recording Notifier
// ==================

/// In-memory notifier for testing; optionally fails every dispatch
pub struct RecordingNotifier {
    sent: RwLock<Vec<(String, EmailTemplate)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
            fail: false,
        }
    }

    /// A notifier whose every dispatch fails, for partial-failure tests
    pub fn failing() -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(String, EmailTemplate)> {
        self.sent.read().unwrap().clone()
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, recipient: &str, template: EmailTemplate) -> AuthResult<()> {
        if self.fail {
            return Err(AuthError::NotificationFailed("SMTP unreachable".to_string()));
        }
        self.sent
            .write()
            .unwrap()
            .push((recipient.to_string(), template));
        Ok(())
    }
}
