//! # Authentication Configuration
//!
//! Explicit immutable configuration passed into each component at
//! construction; no ambient lookup inside business logic. Secrets carry no
//! defaults and must be supplied by the operator.

use chrono::Duration;

/// Configuration for the authentication subsystem
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Signing secret for access tokens (no default)
    pub access_token_secret: String,
    /// Signing secret for refresh tokens (no default, must differ from access)
    pub refresh_token_secret: String,
    /// Access token lifetime (minutes scale)
    pub access_token_ttl: Duration,
    /// Refresh token / session lifetime (days scale)
    pub refresh_token_ttl: Duration,
    /// Remaining session lifetime at or below which refresh rotates the token
    pub rotation_threshold: Duration,
    /// Trailing window for password-reset throttling
    pub reset_window: Duration,
    /// Maximum reset codes issued per account within the window
    pub reset_max_attempts: usize,
    /// Application origin used to build email links, e.g. "https://app.example.com"
    pub app_origin: String,
    /// Issuer label shown in authenticator apps
    pub totp_issuer: String,
}

impl AuthConfig {
    /// Create a config with conventional TTLs; secrets and origin are explicit.
    pub fn new(
        access_token_secret: impl Into<String>,
        refresh_token_secret: impl Into<String>,
        app_origin: impl Into<String>,
    ) -> Self {
        Self {
            access_token_secret: access_token_secret.into(),
            refresh_token_secret: refresh_token_secret.into(),
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(30),
            rotation_threshold: Duration::days(1),
            reset_window: Duration::minutes(3),
            reset_max_attempts: 2,
            app_origin: app_origin.into(),
            totp_issuer: "Sentra".to_string(),
        }
    }

    /// Validate the configuration, collecting every problem at once.
    pub fn validate(&self) -> Result<(), Vec<ConfigValidationError>> {
        let mut v = ConfigValidator::new();

        v.validate_non_empty("access_token_secret", &self.access_token_secret);
        v.validate_non_empty("refresh_token_secret", &self.refresh_token_secret);
        if !self.access_token_secret.is_empty()
            && self.access_token_secret == self.refresh_token_secret
        {
            v.error(
                "refresh_token_secret",
                "<redacted>",
                "Access and refresh secrets must be distinct",
            );
        }
        v.validate_positive(
            "access_token_ttl",
            self.access_token_ttl.num_seconds(),
        );
        v.validate_positive(
            "refresh_token_ttl",
            self.refresh_token_ttl.num_seconds(),
        );
        v.validate_positive(
            "rotation_threshold",
            self.rotation_threshold.num_seconds(),
        );
        if self.rotation_threshold >= self.refresh_token_ttl {
            v.error(
                "rotation_threshold",
                self.rotation_threshold.num_seconds(),
                "Rotation threshold must be shorter than the refresh TTL",
            );
        }
        v.validate_positive("reset_window", self.reset_window.num_seconds());
        v.validate_positive("reset_max_attempts", self.reset_max_attempts as i64);
        v.validate_non_empty("app_origin", &self.app_origin);
        v.validate_non_empty("totp_issuer", &self.totp_issuer);

        v.finish()
    }
}

// ==================
// Validation
// ==================

/// Configuration validation error
#[derive(Debug)]
pub struct ConfigValidationError {
    pub field: String,
    pub value: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid configuration for '{}': {} (value: {})",
            self.field, self.message, self.value
        )
    }
}

impl std::error::Error for ConfigValidationError {}

/// Field-by-field validator that collects all errors before reporting.
struct ConfigValidator {
    errors: Vec<ConfigValidationError>,
}

impl ConfigValidator {
    fn new() -> Self {
        Self { errors: Vec::new() }
    }

    fn error(&mut self, field: &str, value: impl std::fmt::Display, message: &str) {
        self.errors.push(ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            message: message.to_string(),
        });
    }

    fn validate_positive(&mut self, field: &str, value: i64) -> &mut Self {
        if value <= 0 {
            self.error(field, value, "Value must be positive");
        }
        self
    }

    fn validate_non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.error(field, "<empty>", "Value cannot be empty");
        }
        self
    }

    fn finish(self) -> Result<(), Vec<ConfigValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}
