//! Authenticated caller types.

use std::{fmt, sync::Arc};

use super::store::{KeyKind, UserRecord};

/// The identity the session layer needs from a user.
pub trait SessionUser: fmt::Debug + Send + Sync {
    /// Key stored in the session and used to find the record again.
    fn id(&self) -> String;

    fn username(&self) -> &str;

    fn is_authenticated(&self) -> bool {
        true
    }
}

pub type CurrentUser = Arc<dyn SessionUser>;

/// User addressed by username.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedUser {
    username: String,
}

impl NamedUser {
    #[must_use]
    pub fn new(username: String) -> Self {
        Self { username }
    }
}

impl SessionUser for NamedUser {
    fn id(&self) -> String {
        self.username.clone()
    }

    fn username(&self) -> &str {
        &self.username
    }
}

/// User addressed by numeric id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NumberedUser {
    id: u64,
    username: String,
}

impl NumberedUser {
    #[must_use]
    pub fn new(id: u64, username: String) -> Self {
        Self { id, username }
    }
}

impl SessionUser for NumberedUser {
    fn id(&self) -> String {
        self.id.to_string()
    }

    fn username(&self) -> &str {
        &self.username
    }
}

/// Wrap a store record in the user shape matching the store's key.
#[must_use]
pub fn from_record(kind: KeyKind, record: &UserRecord) -> CurrentUser {
    match kind {
        KeyKind::Username => Arc::new(NamedUser::new(record.username.clone())),
        KeyKind::Id => Arc::new(NumberedUser::new(record.id, record.username.clone())),
    }
}
