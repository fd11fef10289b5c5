//! # Accounts
//!
//! Identity records and their repository seam. The password hash never
//! leaves the record in serialized form, and the TOTP secret is likewise
//! withheld from serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use uuid::Uuid;

use crate::errors::{AuthError, AuthResult};

/// Per-account MFA preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MfaPreferences {
    /// Whether TOTP verification is required at login
    pub enabled: bool,
    /// Base32 TOTP secret; present but unverified while setup is pending
    #[serde(skip_serializing, default)]
    pub totp_secret: Option<String>,
}

/// An account record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// Unique, case-normalized
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub email_verified: bool,
    pub mfa: MfaPreferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(&email.into()),
            password_hash: password_hash.into(),
            email_verified: false,
            mfa: MfaPreferences::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Canonical form used for lookups and uniqueness
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ==================
// Account Repository
// ==================

/// Repository for accounts
pub trait AccountRepository: Send + Sync {
    /// Find by normalized email
    fn find_by_email(&self, email: &str) -> AuthResult<Option<Account>>;

    /// Find by id
    fn find_by_id(&self, id: Uuid) -> AuthResult<Option<Account>>;

    /// Create a new account; fails if the email is already taken
    fn create(&self, account: Account) -> AuthResult<Account>;

    /// Persist a mutated account record
    fn update(&self, account: &Account) -> AuthResult<()>;
}

/// In-memory account repository for testing
pub struct InMemoryAccountRepository {
    accounts: RwLock<Vec<Account>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryAccountRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountRepository for InMemoryAccountRepository {
    fn find_by_email(&self, email: &str) -> AuthResult<Option<Account>> {
        let normalized = normalize_email(email);
        let accounts = self.accounts.read().unwrap();
        Ok(accounts.iter().find(|a| a.email == normalized).cloned())
    }

    fn find_by_id(&self, id: Uuid) -> AuthResult<Option<Account>> {
        let accounts = self.accounts.read().unwrap();
        Ok(accounts.iter().find(|a| a.id == id).cloned())
    }

    fn create(&self, account: Account) -> AuthResult<Account> {
        let mut accounts = self.accounts.write().unwrap();
        if accounts.iter().any(|a| a.email == account.email) {
            return Err(AuthError::EmailAlreadyExists);
        }
        accounts.push(account.clone());
        Ok(account)
    }

    fn update(&self, account: &Account) -> AuthResult<()> {
        let mut accounts = self.accounts.write().unwrap();
        match accounts.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => {
                *existing = account.clone();
                existing.updated_at = Utc::now();
                Ok(())
            }
            None => Err(AuthError::AccountNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
        let account = Account::new("Mixed@Case.Org", "hash");
        assert_eq!(account.email, "mixed@case.org");
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let repo = InMemoryAccountRepository::new();
        repo.create(Account::new("user@example.com", "hash")).unwrap();

        let result = repo.create(Account::new("USER@example.com", "hash2"));
        assert_eq!(result.unwrap_err(), AuthError::EmailAlreadyExists);
    }

    #[test]
    fn test_find_by_email_is_case_insensitive() {
        let repo = InMemoryAccountRepository::new();
        repo.create(Account::new("user@example.com", "hash")).unwrap();

        let found = repo.find_by_email("User@Example.Com").unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn test_update_roundtrip() {
        let repo = InMemoryAccountRepository::new();
        let mut account = repo.create(Account::new("user@example.com", "hash")).unwrap();

        account.email_verified = true;
        repo.update(&account).unwrap();

        let found = repo.find_by_id(account.id).unwrap().unwrap();
        assert!(found.email_verified);
    }

    #[test]
    fn test_update_unknown_account_fails() {
        let repo = InMemoryAccountRepository::new();
        let account = Account::new("ghost@example.com", "hash");
        assert_eq!(repo.update(&account).unwrap_err(), AuthError::AccountNotFound);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let account = Account::new("user@example.com", "super-secret-hash");
        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("super-secret-hash"));
    }
}
