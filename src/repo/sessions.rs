//! Per-user session history (generation events and finished study runs).

use tracing::warn;

use crate::errors::Result;
use crate::model::{GenerationSession, SessionEntry, StudyRecord};
use crate::store::keys::{Collection, SessionContext};
use crate::store::Store;

/// Repository for the active user's session history. Append-only in normal
/// operation; entries can be deleted individually.
#[derive(Debug, Clone)]
pub struct SessionRepo {
    store: Store,
}

impl SessionRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn key(ctx: &SessionContext) -> Option<String> {
        ctx.collection_key(Collection::Sessions)
    }

    pub fn get_all(&self, ctx: &SessionContext) -> Result<Vec<SessionEntry>> {
        match Self::key(ctx) {
            Some(key) => Ok(self.store.get(&key)?.unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    /// Append one entry. `Ok(false)` when no user is active.
    pub fn append(&self, ctx: &SessionContext, entry: &SessionEntry) -> Result<bool> {
        let Some(key) = Self::key(ctx) else {
            warn!("no active user, session entry not persisted");
            return Ok(false);
        };
        let mut entries: Vec<SessionEntry> = self.store.get(&key)?.unwrap_or_default();
        entries.push(entry.clone());
        self.store.set(&key, &entries)?;
        Ok(true)
    }

    /// Only the generation events, in insertion order.
    pub fn generation_sessions(&self, ctx: &SessionContext) -> Result<Vec<GenerationSession>> {
        Ok(self
            .get_all(ctx)?
            .into_iter()
            .filter_map(|e| match e {
                SessionEntry::Generation(s) => Some(s),
                SessionEntry::Study(_) => None,
            })
            .collect())
    }

    /// Only the finished study runs, in insertion order.
    pub fn study_history(&self, ctx: &SessionContext) -> Result<Vec<StudyRecord>> {
        Ok(self
            .get_all(ctx)?
            .into_iter()
            .filter_map(|e| match e {
                SessionEntry::Study(s) => Some(s),
                SessionEntry::Generation(_) => None,
            })
            .collect())
    }

    pub fn delete(&self, ctx: &SessionContext, id: &str) -> Result<bool> {
        let Some(key) = Self::key(ctx) else {
            return Ok(false);
        };
        let mut entries: Vec<SessionEntry> = self.store.get(&key)?.unwrap_or_default();
        let before = entries.len();
        entries.retain(|e| e.id() != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.store.set(&key, &entries)?;
        Ok(true)
    }
}
