//! # Credential Verification
//!
//! Argon2id password hashing and email/password verification. Unknown email
//! and wrong password produce the same error so callers cannot probe which
//! accounts exist.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::sync::Arc;

use crate::account::{Account, AccountRepository};
use crate::errors::{AuthError, AuthResult};

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::internal(format!("Password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Check a plaintext password against a stored hash.
///
/// Argon2 recomputes the digest and compares it in constant time; a malformed
/// stored hash counts as a mismatch rather than an error.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Verifies email/password pairs against stored credentials
pub struct CredentialVerifier<A: AccountRepository> {
    accounts: Arc<A>,
}

impl<A: AccountRepository> CredentialVerifier<A> {
    pub fn new(accounts: Arc<A>) -> Self {
        Self { accounts }
    }

    /// Verify a credential pair, returning the account on success.
    pub fn verify(&self, email: &str, password: &str) -> AuthResult<Account> {
        let account = self
            .accounts
            .find_by_email(email)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &account.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(account)
    }
}
