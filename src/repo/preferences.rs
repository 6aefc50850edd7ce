//! Per-user preferences, including the favorites set.

use tracing::warn;

use crate::errors::Result;
use crate::model::UserPreferences;
use crate::store::keys::{Collection, SessionContext};
use crate::store::Store;

/// Repository for the active user's preferences. Reads fall back to
/// defaults so callers never deal with an absent record.
#[derive(Debug, Clone)]
pub struct PreferencesRepo {
    store: Store,
}

impl PreferencesRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn key(ctx: &SessionContext) -> Option<String> {
        ctx.collection_key(Collection::Preferences)
    }

    pub fn get(&self, ctx: &SessionContext) -> Result<UserPreferences> {
        match Self::key(ctx) {
            Some(key) => Ok(self.store.get(&key)?.unwrap_or_default()),
            None => Ok(UserPreferences::default()),
        }
    }

    pub fn save(&self, ctx: &SessionContext, prefs: &UserPreferences) -> Result<bool> {
        let Some(key) = Self::key(ctx) else {
            warn!("no active user, preferences not persisted");
            return Ok(false);
        };
        self.store.set(&key, prefs)?;
        Ok(true)
    }

    /// Toggle a question in the favorites set. Returns whether the question
    /// is a favorite after the call.
    pub fn toggle_favorite(&self, ctx: &SessionContext, question_id: &str) -> Result<bool> {
        let mut prefs = self.get(ctx)?;
        let now_favorite = if let Some(pos) = prefs.favorites.iter().position(|id| id == question_id) {
            prefs.favorites.remove(pos);
            false
        } else {
            prefs.favorites.push(question_id.to_string());
            true
        };
        self.save(ctx, &prefs)?;
        Ok(now_favorite)
    }

    pub fn favorites(&self, ctx: &SessionContext) -> Result<Vec<String>> {
        Ok(self.get(ctx)?.favorites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_repo() -> (tempfile::TempDir, PreferencesRepo) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path(), None).expect("open store");
        (dir, PreferencesRepo::new(store))
    }

    #[test]
    fn test_get_falls_back_to_defaults() {
        let (_dir, repo) = temp_repo();
        let ctx = SessionContext::for_user("alice");
        let prefs = repo.get(&ctx).unwrap();
        assert_eq!(prefs, UserPreferences::default());
    }

    #[test]
    fn test_save_then_get() {
        let (_dir, repo) = temp_repo();
        let ctx = SessionContext::for_user("alice");
        let mut prefs = UserPreferences::default();
        prefs.dark_mode = true;
        repo.save(&ctx, &prefs).unwrap();
        assert!(repo.get(&ctx).unwrap().dark_mode);
    }

    #[test]
    fn test_toggle_favorite_round_trip() {
        let (_dir, repo) = temp_repo();
        let ctx = SessionContext::for_user("alice");

        assert!(repo.toggle_favorite(&ctx, "q-1").unwrap());
        assert_eq!(repo.favorites(&ctx).unwrap(), vec!["q-1".to_string()]);

        assert!(!repo.toggle_favorite(&ctx, "q-1").unwrap());
        assert!(repo.favorites(&ctx).unwrap().is_empty());
    }
}
