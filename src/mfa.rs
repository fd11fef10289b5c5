//! # Multi-Factor Authentication (MFA)
//!
//! TOTP-based multi-factor authentication using RFC 6238. The secret lives
//! on the account: generated and persisted at setup time (so repeated setup
//! calls reuse the same pending secret), activated once the user proves they
//! can produce a matching code.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::account::{Account, AccountRepository};
use crate::errors::{AuthError, AuthResult};

// ==================
// TOTP Configuration
// ==================

/// TOTP configuration
#[derive(Debug, Clone)]
pub struct TotpConfig {
    /// Issuer name (shown in authenticator apps)
    pub issuer: String,
    /// Number of digits (default: 6)
    pub digits: u32,
    /// Time step in seconds (default: 30)
    pub period: u64,
    /// Algorithm (default: SHA1 for authenticator compatibility)
    pub algorithm: TotpAlgorithm,
    /// Number of periods to check before/after current (default: 1)
    pub skew: u32,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            issuer: "Sentra".to_string(),
            digits: 6,
            period: 30,
            algorithm: TotpAlgorithm::SHA1,
            skew: 1,
        }
    }
}

/// TOTP hash algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TotpAlgorithm {
    SHA1,
    SHA256,
    SHA512,
}

impl std::fmt::Display for TotpAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TotpAlgorithm::SHA1 => write!(f, "SHA1"),
            TotpAlgorithm::SHA256 => write!(f, "SHA256"),
            TotpAlgorithm::SHA512 => write!(f, "SHA512"),
        }
    }
}

// ==================
// TOTP Implementation
// ==================

/// Generate a random secret (Base32 encoded)
pub fn generate_secret() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 20] = rng.gen();
    base32_encode(&bytes)
}

/// Base32 encoding (RFC 4648)
fn base32_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
    let mut result = String::new();
    let mut buffer: u64 = 0;
    let mut bits_left = 0;

    for &byte in data {
        buffer = (buffer << 8) | (byte as u64);
        bits_left += 8;

        while bits_left >= 5 {
            bits_left -= 5;
            let index = ((buffer >> bits_left) & 0x1F) as usize;
            result.push(ALPHABET[index] as char);
        }
    }

    if bits_left > 0 {
        let index = ((buffer << (5 - bits_left)) & 0x1F) as usize;
        result.push(ALPHABET[index] as char);
    }

    result
}

/// Base32 decoding
fn base32_decode(encoded: &str) -> Option<Vec<u8>> {
    const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
    let mut result = Vec::new();
    let mut buffer: u64 = 0;
    let mut bits_left = 0;

    for c in encoded.chars() {
        let c = c.to_ascii_uppercase();
        if c == '=' {
            continue;
        }
        let value = ALPHABET.find(c)? as u64;
        buffer = (buffer << 5) | value;
        bits_left += 5;

        if bits_left >= 8 {
            bits_left -= 8;
            result.push((buffer >> bits_left) as u8);
        }
    }

    Some(result)
}

/// Generate the TOTP code for a given timestamp
pub fn generate_totp(secret: &str, timestamp: u64, config: &TotpConfig) -> AuthResult<String> {
    let secret_bytes =
        base32_decode(secret).ok_or_else(|| AuthError::internal("Invalid TOTP secret"))?;

    let counter = timestamp / config.period;
    let counter_bytes = counter.to_be_bytes();

    let hash = compute_hmac(&secret_bytes, &counter_bytes, config.algorithm);

    // Dynamic truncation (RFC 4226 §5.3)
    let offset = (hash[hash.len() - 1] & 0x0F) as usize;
    let binary = ((hash[offset] & 0x7F) as u32) << 24
        | (hash[offset + 1] as u32) << 16
        | (hash[offset + 2] as u32) << 8
        | (hash[offset + 3] as u32);

    let otp = binary % 10u32.pow(config.digits);
    Ok(format!("{:0>width$}", otp, width = config.digits as usize))
}

/// Compute HMAC with the specified algorithm
fn compute_hmac(key: &[u8], data: &[u8], algorithm: TotpAlgorithm) -> Vec<u8> {
    match algorithm {
        TotpAlgorithm::SHA1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC can accept any key size");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        TotpAlgorithm::SHA256 => {
            let mut mac =
                Hmac::<Sha256>::new_from_slice(key).expect("HMAC can accept any key size");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        TotpAlgorithm::SHA512 => {
            let mut mac =
                Hmac::<Sha512>::new_from_slice(key).expect("HMAC can accept any key size");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// Constant-time code comparison
fn codes_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Verify a TOTP code against the current and adjacent time steps,
/// evaluated at an explicit timestamp
pub fn verify_totp_at(
    secret: &str,
    code: &str,
    timestamp: u64,
    config: &TotpConfig,
) -> AuthResult<bool> {
    for offset in 0..=config.skew {
        let ts = timestamp + (offset as u64 * config.period);
        if codes_match(&generate_totp(secret, ts, config)?, code) {
            return Ok(true);
        }

        // Check current - offset (skip 0 to avoid duplicate)
        if offset > 0 {
            let ts = timestamp.saturating_sub(offset as u64 * config.period);
            if codes_match(&generate_totp(secret, ts, config)?, code) {
                return Ok(true);
            }
        }
    }

    Ok(false)
}

/// Verify a TOTP code at the current system time
pub fn verify_totp(secret: &str, code: &str, config: &TotpConfig) -> AuthResult<bool> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| AuthError::internal("System time error"))?
        .as_secs();
    verify_totp_at(secret, code, now, config)
}

/// Generate an otpauth:// provisioning URI for QR rendering
pub fn generate_totp_uri(secret: &str, email: &str, config: &TotpConfig) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm={}&digits={}&period={}",
        urlencoding::encode(&config.issuer),
        urlencoding::encode(email),
        secret,
        urlencoding::encode(&config.issuer),
        config.algorithm,
        config.digits,
        config.period
    )
}

// ==================
// MFA Manager
// ==================

/// Outcome of starting MFA setup
#[derive(Debug, Clone, Serialize)]
pub enum MfaSetup {
    /// Non-fatal: MFA is already active, no new secret is handed out
    AlreadyEnabled,
    /// Secret persisted and awaiting verification
    Pending {
        secret: String,
        provisioning_uri: String,
    },
}

/// Issues and verifies TOTP secrets/codes and persists the enabled flag
pub struct MfaManager<A: AccountRepository> {
    accounts: Arc<A>,
    config: TotpConfig,
}

impl<A: AccountRepository> MfaManager<A> {
    pub fn new(accounts: Arc<A>, config: TotpConfig) -> Self {
        Self { accounts, config }
    }

    /// Begin TOTP setup for an account.
    ///
    /// Idempotent: a pending secret is persisted before verification and
    /// reused on repeated calls, so clients that retry never orphan secrets.
    pub fn begin_setup(&self, account_id: Uuid) -> AuthResult<MfaSetup> {
        let mut account = self
            .accounts
            .find_by_id(account_id)?
            .ok_or(AuthError::AccountNotFound)?;

        if account.mfa.enabled {
            return Ok(MfaSetup::AlreadyEnabled);
        }

        let secret = match account.mfa.totp_secret.clone() {
            Some(pending) => pending,
            None => {
                let secret = generate_secret();
                account.mfa.totp_secret = Some(secret.clone());
                self.accounts.update(&account)?;
                secret
            }
        };

        let provisioning_uri = generate_totp_uri(&secret, &account.email, &self.config);
        Ok(MfaSetup::Pending {
            secret,
            provisioning_uri,
        })
    }

    /// Validate the submitted code against the submitted secret and, on
    /// success, flip the enabled flag. No state is touched on failure.
    pub fn complete_setup(&self, account_id: Uuid, code: &str, secret: &str) -> AuthResult<()> {
        let mut account = self
            .accounts
            .find_by_id(account_id)?
            .ok_or(AuthError::AccountNotFound)?;

        if account.mfa.enabled {
            return Ok(());
        }

        if !verify_totp(secret, code, &self.config)? {
            return Err(AuthError::MfaInvalidCode);
        }

        account.mfa.enabled = true;
        account.mfa.totp_secret = Some(secret.to_string());
        self.accounts.update(&account)?;
        tracing::info!(account_id = %account.id, "MFA enabled");
        Ok(())
    }

    /// TOTP check during login; no state mutation, no secret regeneration.
    pub fn verify_for_login(&self, account: &Account, code: &str) -> AuthResult<bool> {
        let secret = account
            .mfa
            .totp_secret
            .as_deref()
            .ok_or(AuthError::MfaInvalidCode)?;
        verify_totp(secret, code, &self.config)
    }

    /// Disable MFA and discard the stored secret.
    pub fn revoke(&self, account_id: Uuid) -> AuthResult<()> {
        let mut account = self
            .accounts
            .find_by_id(account_id)?
            .ok_or(AuthError::AccountNotFound)?;

        account.mfa.enabled = false;
        account.mfa.totp_secret = None;
        self.accounts.update(&account)?;
        tracing::info!(account_id = %account.id, "MFA revoked");
        Ok(())
    }
}

// ==================
// Tests
// ==================
