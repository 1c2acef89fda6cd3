//! In-memory user store.
//!
//! The store owns the flat list of user records for the lifetime of the
//! process. Reads hand out clones; mutations run inside a single write lock so
//! a check-then-apply on balances is never interleaved with another request.

use serde::Deserialize;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::debug;

use super::error::{Error, Result};
use super::state::Variant;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub balance: i64,
}

impl UserRecord {
    #[must_use]
    pub fn new(id: u64, username: &str, password: &str, balance: i64) -> Self {
        Self {
            id,
            username: username.to_string(),
            password: password.to_string(),
            balance,
        }
    }
}

/// Field used to address a record from a session or a form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Username,
    Id,
}

impl KeyKind {
    #[must_use]
    pub fn key_of(self, record: &UserRecord) -> String {
        match self {
            Self::Username => record.username.clone(),
            Self::Id => record.id.to_string(),
        }
    }

    #[must_use]
    pub fn matches(self, record: &UserRecord, key: &str) -> bool {
        match self {
            Self::Username => record.username == key,
            Self::Id => key.trim().parse::<u64>().is_ok_and(|id| record.id == id),
        }
    }
}

#[derive(Debug)]
pub struct UserStore {
    kind: KeyKind,
    users: RwLock<Vec<UserRecord>>,
}

impl UserStore {
    /// Build a store, rejecting duplicate usernames or ids.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSeed`] when two records share a username or id.
    pub fn new(kind: KeyKind, users: Vec<UserRecord>) -> Result<Self> {
        let mut usernames = HashSet::new();
        let mut ids = HashSet::new();
        for user in &users {
            if !usernames.insert(user.username.as_str()) {
                return Err(Error::InvalidSeed(format!(
                    "duplicate username '{}'",
                    user.username
                )));
            }
            if !ids.insert(user.id) {
                return Err(Error::InvalidSeed(format!("duplicate id {}", user.id)));
            }
        }

        debug!("user store seeded with {} record(s)", users.len());

        Ok(Self {
            kind,
            users: RwLock::new(users),
        })
    }

    /// Parse a JSON array of user records.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or contains duplicates.
    pub fn from_json(kind: KeyKind, json: &str) -> Result<Self> {
        let users: Vec<UserRecord> = serde_json::from_str(json)?;
        Self::new(kind, users)
    }

    /// Default records for a variant.
    #[must_use]
    pub fn seed(variant: Variant) -> Vec<UserRecord> {
        match variant {
            Variant::Basic | Variant::Csrf => vec![UserRecord::new(1, "test", "test", 2000)],
            Variant::Loader => vec![
                UserRecord::new(1, "test", "test", 2000),
                UserRecord::new(2, "alice", "alice", 1000),
            ],
        }
    }

    #[must_use]
    pub fn key_kind(&self) -> KeyKind {
        self.kind
    }

    pub async fn find(&self, key: &str) -> Option<UserRecord> {
        let kind = self.kind;
        self.users
            .read()
            .await
            .iter()
            .find(|user| kind.matches(user, key))
            .cloned()
    }

    pub async fn find_by_username(&self, username: &str) -> Option<UserRecord> {
        self.users
            .read()
            .await
            .iter()
            .find(|user| user.username == username)
            .cloned()
    }

    /// Run `f` with exclusive access to every record.
    pub async fn with_users_mut<F, T>(&self, f: F) -> T
    where
        F: FnOnce(KeyKind, &mut [UserRecord]) -> T,
    {
        let mut users = self.users.write().await;
        f(self.kind, users.as_mut_slice())
    }
}
