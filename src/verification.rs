//! # Verification Codes
//!
//! Single-use codes bound to an account and a purpose (email verification or
//! password reset). Consumption is exactly-once: the find-and-delete happens
//! under one write lock, so two concurrent redemptions of the same code
//! cannot both succeed. Issuance can be bounded per account within a
//! trailing window through the same critical section.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use uuid::Uuid;

use crate::errors::AuthResult;

/// Purpose of a verification code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationKind {
    EmailVerification,
    PasswordReset,
}

/// A single-use verification code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCode {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Opaque, globally unique, unpredictable
    pub code: String,
    pub kind: VerificationKind,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn new(account_id: Uuid, kind: VerificationKind, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            code: generate_code(),
            kind,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Generate an opaque code from 20 bytes of OS randomness
fn generate_code() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// ==================
// Verification Code Store
// ==================

/// Store for verification codes
pub trait VerificationCodeStore: Send + Sync {
    fn create(&self, code: VerificationCode) -> AuthResult<VerificationCode>;

    /// Insert only if fewer than `max_in_window` codes of the same kind exist
    /// for the account with `created_at > window_start`. The count and the
    /// insert share one critical section, so concurrent issuance cannot
    /// overshoot the limit. Returns `None` when the limit is hit.
    fn create_limited(
        &self,
        code: VerificationCode,
        window_start: DateTime<Utc>,
        max_in_window: usize,
    ) -> AuthResult<Option<VerificationCode>>;

    /// Atomically find and delete an unexpired code of the given kind.
    /// Expired or unknown codes return `None`; a second call with the same
    /// code always returns `None`.
    fn consume(
        &self,
        code: &str,
        kind: VerificationKind,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<VerificationCode>>;

    /// Drop every outstanding code of one kind for an account
    fn delete_all_by_account(
        &self,
        account_id: Uuid,
        kind: VerificationKind,
    ) -> AuthResult<usize>;
}

/// In-memory verification code store for testing
pub struct InMemoryVerificationCodeStore {
    codes: RwLock<Vec<VerificationCode>>,
}

impl InMemoryVerificationCodeStore {
    pub fn new() -> Self {
        Self {
            codes: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryVerificationCodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationCodeStore for InMemoryVerificationCodeStore {
    fn create(&self, code: VerificationCode) -> AuthResult<VerificationCode> {
        let mut codes = self.codes.write().unwrap();
        codes.push(code.clone());
        Ok(code)
    }

    fn create_limited(
        &self,
        code: VerificationCode,
        window_start: DateTime<Utc>,
        max_in_window: usize,
    ) -> AuthResult<Option<VerificationCode>> {
        let mut codes = self.codes.write().unwrap();
        let recent = codes
            .iter()
            .filter(|c| {
                c.account_id == code.account_id
                    && c.kind == code.kind
                    && c.created_at > window_start
            })
            .count();
        if recent >= max_in_window {
            return Ok(None);
        }
        codes.push(code.clone());
        Ok(Some(code))
    }

    fn consume(
        &self,
        code: &str,
        kind: VerificationKind,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<VerificationCode>> {
        let mut codes = self.codes.write().unwrap();
        let position = codes
            .iter()
            .position(|c| c.code == code && c.kind == kind && !c.is_expired(now));
        Ok(position.map(|i| codes.remove(i)))
    }

    fn delete_all_by_account(
        &self,
        account_id: Uuid,
        kind: VerificationKind,
    ) -> AuthResult<usize> {
        let mut codes = self.codes.write().unwrap();
        let before = codes.len();
        codes.retain(|c| !(c.account_id == account_id && c.kind == kind));
        Ok(before - codes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique_and_opaque() {
        let a = generate_code();
        let b = generate_code();
        assert_eq!(a.len(), 40);
        assert_ne!(a, b);
    }

    #[test]
    fn test_consume_is_single_use() {
        let store = InMemoryVerificationCodeStore::new();
        let code = store
            .create(VerificationCode::new(
                Uuid::new_v4(),
                VerificationKind::EmailVerification,
                Duration::minutes(45),
            ))
            .unwrap();

        let now = Utc::now();
        let first = store
            .consume(&code.code, VerificationKind::EmailVerification, now)
            .unwrap();
        assert!(first.is_some());

        // Retried redemption of the same code fails
        let second = store
            .consume(&code.code, VerificationKind::EmailVerification, now)
            .unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn test_consume_respects_kind() {
        let store = InMemoryVerificationCodeStore::new();
        let code = store
            .create(VerificationCode::new(
                Uuid::new_v4(),
                VerificationKind::PasswordReset,
                Duration::hours(1),
            ))
            .unwrap();

        let wrong_kind = store
            .consume(&code.code, VerificationKind::EmailVerification, Utc::now())
            .unwrap();
        assert!(wrong_kind.is_none());

        // The code is still there for its real purpose
        let right_kind = store
            .consume(&code.code, VerificationKind::PasswordReset, Utc::now())
            .unwrap();
        assert!(right_kind.is_some());
    }

    #[test]
    fn test_expired_code_not_consumable() {
        let store = InMemoryVerificationCodeStore::new();
        let mut code = VerificationCode::new(
            Uuid::new_v4(),
            VerificationKind::PasswordReset,
            Duration::hours(1),
        );
        code.expires_at = Utc::now() - Duration::minutes(1);
        let code = store.create(code).unwrap();

        let result = store
            .consume(&code.code, VerificationKind::PasswordReset, Utc::now())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_create_limited_enforces_window() {
        let store = InMemoryVerificationCodeStore::new();
        let account_id = Uuid::new_v4();
        let window_start = Utc::now() - Duration::minutes(3);

        for _ in 0..2 {
            let created = store
                .create_limited(
                    VerificationCode::new(account_id, VerificationKind::PasswordReset, Duration::hours(1)),
                    window_start,
                    2,
                )
                .unwrap();
            assert!(created.is_some());
        }

        let third = store
            .create_limited(
                VerificationCode::new(account_id, VerificationKind::PasswordReset, Duration::hours(1)),
                window_start,
                2,
            )
            .unwrap();
        assert!(third.is_none());
    }

    #[test]
    fn test_create_limited_ignores_other_kinds() {
        let store = InMemoryVerificationCodeStore::new();
        let account_id = Uuid::new_v4();
        let window_start = Utc::now() - Duration::minutes(3);

        store
            .create(VerificationCode::new(
                account_id,
                VerificationKind::EmailVerification,
                Duration::minutes(45),
            ))
            .unwrap();

        let created = store
            .create_limited(
                VerificationCode::new(account_id, VerificationKind::PasswordReset, Duration::hours(1)),
                window_start,
                1,
            )
            .unwrap();
        assert!(created.is_some());
    }

    #[test]
    fn test_delete_all_by_account_scoped_to_kind() {
        let store = InMemoryVerificationCodeStore::new();
        let account_id = Uuid::new_v4();

        store
            .create(VerificationCode::new(
                account_id,
                VerificationKind::PasswordReset,
                Duration::hours(1),
            ))
            .unwrap();
        let keep = store
            .create(VerificationCode::new(
                account_id,
                VerificationKind::EmailVerification,
                Duration::minutes(45),
            ))
            .unwrap();

        assert_eq!(
            store
                .delete_all_by_account(account_id, VerificationKind::PasswordReset)
                .unwrap(),
            1
        );
        assert!(store
            .consume(&keep.code, VerificationKind::EmailVerification, Utc::now())
            .unwrap()
            .is_some());
    }
}
