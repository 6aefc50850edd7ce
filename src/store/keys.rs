//! Key namespace resolution.
//!
//! All persisted state lives under string keys of the form
//! `quizforge_users`, `quizforge_<userId>_questions`, `quizforge_backups`,
//! etc. Per-user collections are partitioned by the active user's id.
//!
//! There is no ambient "current user" global: callers carry an explicit
//! [`SessionContext`] and every repository operation is a pure function of
//! `(store, context, ...)`. An anonymous context resolves per-user keys to
//! `None`, which readers treat as "no data available" rather than an error.

use serde::{Deserialize, Serialize};

use crate::store::StoreEvent;

/// Fixed application prefix for every storage key.
pub const APP_PREFIX: &str = "quizforge";

/// Global (non-namespaced) key holding the list of all registered users.
pub const USERS_KEY: &str = "quizforge_users";

/// Global single-value slot holding the currently logged-in user.
pub const CURRENT_USER_KEY: &str = "quizforge_user";

/// Global key holding the backup ledger.
pub const BACKUPS_KEY: &str = "quizforge_backups";

/// Logical names of the per-user collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Questions,
    Sessions,
    Preferences,
    Gamification,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Questions => "questions",
            Collection::Sessions => "sessions",
            Collection::Preferences => "preferences",
            Collection::Gamification => "gamification",
        }
    }

    /// All per-user collections, in key order.
    pub fn all() -> [Collection; 4] {
        [
            Collection::Questions,
            Collection::Sessions,
            Collection::Preferences,
            Collection::Gamification,
        ]
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity a repository call operates under.
///
/// Anonymous contexts see empty per-user collections and their writes are
/// dropped (reported as "not persisted", never as a user-facing error).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    user_id: Option<String>,
}

impl SessionContext {
    /// A context with no logged-in user.
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    /// A context acting on behalf of the given user.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Derive the concrete storage key for one of this user's collections.
    ///
    /// Returns `None` when no user is active; callers must treat that as
    /// "no data available", not as an error to surface.
    pub fn collection_key(&self, collection: Collection) -> Option<String> {
        self.user_id
            .as_deref()
            .map(|id| user_collection_key(id, collection))
    }
}

/// Concrete key for a specific user's collection (independent of context).
pub fn user_collection_key(user_id: &str, collection: Collection) -> String {
    format!("{}_{}_{}", APP_PREFIX, user_id, collection.as_str())
}

/// Typed session-level event derived from raw store changes.
///
/// The only cross-handle notification core logic reacts to: another handle
/// cleared the current-user slot, so this session must treat itself as
/// logged out. Raw key-change events are never consumed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    ExternalLogout,
}

/// Map a raw store event to a typed session event, if any.
pub fn session_event(event: &StoreEvent) -> Option<SessionEvent> {
    match event {
        StoreEvent::Removed { key } if key == CURRENT_USER_KEY => {
            Some(SessionEvent::ExternalLogout)
        }
        _ => None,
    }
}
