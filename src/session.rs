//! # Sessions
//!
//! One session per authenticated device/browser instance. A session is valid
//! iff `now < expired_at`; only the refresh rotation path may push
//! `expired_at` forward, and it does so through `extend_if` so concurrent
//! rotations cannot both win.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::errors::AuthResult;

/// An authenticated session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub account_id: Uuid,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl Session {
    /// Create a session expiring `ttl` from now. Invariant: `expired_at > created_at`.
    pub fn new(account_id: Uuid, user_agent: Option<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            user_agent,
            created_at: now,
            expired_at: now + ttl,
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expired_at
    }

    /// Remaining lifetime; negative once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expired_at - now
    }
}

// ==================
// Session Store
// ==================

/// Store for session records
pub trait SessionStore: Send + Sync {
    fn create(&self, session: Session) -> AuthResult<Session>;

    fn find_by_id(&self, id: Uuid) -> AuthResult<Option<Session>>;

    fn list_by_account(&self, account_id: Uuid) -> AuthResult<Vec<Session>>;

    /// Unconditional single-field expiry update
    fn extend(&self, id: Uuid, new_expiry: DateTime<Utc>) -> AuthResult<()>;

    /// Conditional expiry update: applies only if the stored `expired_at`
    /// still equals `expected_expiry`. Returns whether the update was applied,
    /// which serializes rotation per session.
    fn extend_if(
        &self,
        id: Uuid,
        expected_expiry: DateTime<Utc>,
        new_expiry: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Returns whether a session was actually removed
    fn delete_by_id(&self, id: Uuid) -> AuthResult<bool>;

    /// Revoke every session for an account; returns the number removed
    fn delete_all_by_account(&self, account_id: Uuid) -> AuthResult<usize>;
}

/// In-memory session store for testing
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, session: Session) -> AuthResult<Session> {
        let mut sessions = self.sessions.write().unwrap();
        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    fn find_by_id(&self, id: Uuid) -> AuthResult<Option<Session>> {
        let sessions = self.sessions.read().unwrap();
        Ok(sessions.get(&id).cloned())
    }

    fn list_by_account(&self, account_id: Uuid) -> AuthResult<Vec<Session>> {
        let sessions = self.sessions.read().unwrap();
        Ok(sessions
            .values()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect())
    }

    fn extend(&self, id: Uuid, new_expiry: DateTime<Utc>) -> AuthResult<()> {
        let mut sessions = self.sessions.write().unwrap();
        if let Some(session) = sessions.get_mut(&id) {
            session.expired_at = new_expiry;
        }
        Ok(())
    }

    fn extend_if(
        &self,
        id: Uuid,
        expected_expiry: DateTime<Utc>,
        new_expiry: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut sessions = self.sessions.write().unwrap();
        match sessions.get_mut(&id) {
            Some(session) if session.expired_at == expected_expiry => {
                session.expired_at = new_expiry;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_by_id(&self, id: Uuid) -> AuthResult<bool> {
        let mut sessions = self.sessions.write().unwrap();
        Ok(sessions.remove(&id).is_some())
    }

    fn delete_all_by_account(&self, account_id: Uuid) -> AuthResult<usize> {
        let mut sessions = self.sessions.write().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.account_id != account_id);
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_invariant() {
        let session = Session::new(Uuid::new_v4(), None, Duration::days(30));
        assert!(session.expired_at > session.created_at);
        assert!(session.is_valid(Utc::now()));
    }

    #[test]
    fn test_validity_boundary() {
        let session = Session::new(Uuid::new_v4(), None, Duration::days(30));
        assert!(!session.is_valid(session.expired_at));
        assert!(session.is_valid(session.expired_at - Duration::seconds(1)));
    }

    #[test]
    fn test_list_by_account() {
        let store = InMemorySessionStore::new();
        let account_id = Uuid::new_v4();

        store
            .create(Session::new(account_id, Some("Firefox".into()), Duration::days(30)))
            .unwrap();
        store
            .create(Session::new(account_id, Some("iPhone".into()), Duration::days(30)))
            .unwrap();
        store
            .create(Session::new(Uuid::new_v4(), None, Duration::days(30)))
            .unwrap();

        assert_eq!(store.list_by_account(account_id).unwrap().len(), 2);
    }

    #[test]
    fn test_extend_if_applies_once() {
        let store = InMemorySessionStore::new();
        let session = store
            .create(Session::new(Uuid::new_v4(), None, Duration::days(2)))
            .unwrap();

        let observed = session.expired_at;
        let new_expiry = Utc::now() + Duration::days(30);

        // First conditional update wins
        assert!(store.extend_if(session.id, observed, new_expiry).unwrap());
        // A second update keyed on the stale expiry loses
        assert!(!store
            .extend_if(session.id, observed, Utc::now() + Duration::days(31))
            .unwrap());

        let stored = store.find_by_id(session.id).unwrap().unwrap();
        assert_eq!(stored.expired_at, new_expiry);
    }

    #[test]
    fn test_extend_if_missing_session() {
        let store = InMemorySessionStore::new();
        let applied = store
            .extend_if(Uuid::new_v4(), Utc::now(), Utc::now() + Duration::days(1))
            .unwrap();
        assert!(!applied);
    }

    #[test]
    fn test_delete_all_by_account() {
        let store = InMemorySessionStore::new();
        let account_id = Uuid::new_v4();

        for _ in 0..3 {
            store
                .create(Session::new(account_id, None, Duration::days(30)))
                .unwrap();
        }
        let other = store
            .create(Session::new(Uuid::new_v4(), None, Duration::days(30)))
            .unwrap();

        assert_eq!(store.delete_all_by_account(account_id).unwrap(), 3);
        assert!(store.find_by_id(other.id).unwrap().is_some());
    }

    #[test]
    fn test_delete_by_id_reports_absence() {
        let store = InMemorySessionStore::new();
        assert!(!store.delete_by_id(Uuid::new_v4()).unwrap());
    }
}
