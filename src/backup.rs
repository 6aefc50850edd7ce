//! Backup ledger.
//!
//! Snapshots the user registry plus the active user's collections into an
//! ordered ledger under a single global key. The ledger holds at most
//! [`MAX_BACKUPS`] entries; creating the eleventh evicts the oldest.
//! Restoring replaces the live collections wholesale with the snapshot.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{BackupError, Result};
use crate::model::{new_id, Backup, BackupData, BackupKind};
use crate::repo::UserRepo;
use crate::store::keys::{Collection, SessionContext, BACKUPS_KEY};
use crate::store::Store;

/// Maximum number of backups retained in the ledger.
pub const MAX_BACKUPS: usize = 10;

/// Default period between automatic backups.
pub const DEFAULT_AUTO_BACKUP_PERIOD: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct BackupManager {
    store: Store,
}

impl BackupManager {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn ledger(&self) -> Result<Vec<Backup>> {
        Ok(self.store.get(BACKUPS_KEY)?.unwrap_or_default())
    }

    /// All backups, oldest first.
    pub fn list(&self) -> Result<Vec<Backup>> {
        self.ledger()
    }

    /// The most recent backup, if any.
    pub fn latest(&self) -> Result<Option<Backup>> {
        Ok(self.ledger()?.into_iter().last())
    }

    /// Snapshot the current state into a new backup.
    ///
    /// Always captures the global user registry. Per-user collections are
    /// captured only when `ctx` has an active user; an anonymous snapshot
    /// carries empty collections.
    pub fn create(&self, ctx: &SessionContext, kind: BackupKind) -> Result<Backup> {
        let users = self.store.get(crate::store::keys::USERS_KEY)?.unwrap_or_default();
        let questions = match ctx.collection_key(Collection::Questions) {
            Some(key) => self.store.get(&key)?.unwrap_or_default(),
            None => Vec::new(),
        };
        let sessions = match ctx.collection_key(Collection::Sessions) {
            Some(key) => self.store.get(&key)?.unwrap_or_default(),
            None => Vec::new(),
        };
        let preferences = match ctx.collection_key(Collection::Preferences) {
            Some(key) => self.store.get(&key)?,
            None => None,
        };

        let backup = Backup {
            id: new_id(),
            kind,
            timestamp: Utc::now(),
            data: BackupData {
                users,
                questions,
                sessions,
                preferences,
            },
        };

        let mut ledger = self.ledger()?;
        ledger.push(backup.clone());
        // Evict oldest entries beyond the bound.
        while ledger.len() > MAX_BACKUPS {
            ledger.remove(0);
        }
        self.store.set(BACKUPS_KEY, &ledger)?;

        info!(backup_id = %backup.id, kind = %kind, "created backup");
        Ok(backup)
    }

    /// Replace the live collections with the snapshot identified by `id`.
    pub fn restore(&self, ctx: &SessionContext, id: &str) -> Result<Backup> {
        let backup = self
            .ledger()?
            .into_iter()
            .find(|b| b.id == id)
            .ok_or_else(|| BackupError::NotFound(id.to_string()))?;

        self.store
            .set(crate::store::keys::USERS_KEY, &backup.data.users)?;
        if let Some(key) = ctx.collection_key(Collection::Questions) {
            self.store.set(&key, &backup.data.questions)?;
        }
        if let Some(key) = ctx.collection_key(Collection::Sessions) {
            self.store.set(&key, &backup.data.sessions)?;
        }
        if let Some(prefs) = &backup.data.preferences {
            if let Some(key) = ctx.collection_key(Collection::Preferences) {
                self.store.set(&key, prefs)?;
            }
        }

        info!(backup_id = %backup.id, "restored backup");
        Ok(backup)
    }
}

/// Spawn the periodic auto-backup task.
///
/// Each tick creates an `auto` backup for the currently logged-in user and
/// silently skips the tick when nobody is logged in. Failures are logged
/// and do not stop the loop.
pub fn spawn_auto_backup(
    manager: BackupManager,
    users: UserRepo,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick fires immediately; skip it so the task only backs
        // up after a full period has passed.
        interval.tick().await;
        loop {
            interval.tick().await;
            let current = match users.current() {
                Ok(user) => user,
                Err(e) => {
                    warn!(error = %e, "auto-backup could not read current user");
                    continue;
                }
            };
            let Some(user) = current else {
                debug!("auto-backup skipped, nobody logged in");
                continue;
            };
            let ctx = SessionContext::for_user(user.id);
            if let Err(e) = manager.create(&ctx, BackupKind::Auto) {
                warn!(error = %e, "auto-backup failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Question, QuestionBody, User};
    use crate::repo::QuestionRepo;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path(), None).expect("open store");
        (dir, store)
    }

    fn sample_question(text: &str) -> Question {
        Question::new(
            text,
            QuestionBody::TrueFalse { answer: true },
            Difficulty::Easy,
            "pasted text",
        )
    }

    #[test]
    fn test_ledger_bounded_at_ten_oldest_evicted() {
        let (_dir, store) = temp_store();
        let manager = BackupManager::new(store);
        let ctx = SessionContext::for_user("alice");

        let mut ids = Vec::new();
        for _ in 0..12 {
            ids.push(manager.create(&ctx, BackupKind::Manual).unwrap().id);
        }

        let ledger = manager.list().unwrap();
        assert_eq!(ledger.len(), MAX_BACKUPS);
        // The two oldest snapshots were evicted, the rest kept in order.
        let kept: Vec<&str> = ledger.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(kept, ids[2..].iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_restore_round_trips_user_data() {
        let (_dir, store) = temp_store();
        let manager = BackupManager::new(store.clone());
        let users = UserRepo::new(store.clone());
        let questions = QuestionRepo::new(store);
        let user = User::new("Ada", "ada@example.com", "secret1");
        let ctx = SessionContext::for_user(user.id.clone());

        users.upsert(&user).unwrap();
        questions.upsert(&ctx, &sample_question("original")).unwrap();
        let backup = manager.create(&ctx, BackupKind::Manual).unwrap();

        // Mutate state after the snapshot.
        questions.upsert(&ctx, &sample_question("added later")).unwrap();
        users.delete(&user.id).unwrap();

        manager.restore(&ctx, &backup.id).unwrap();
        assert_eq!(users.get_all().unwrap().len(), 1);
        let restored = questions.get_all(&ctx).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].question, "original");
    }

    #[test]
    fn test_restore_unknown_id_is_not_found() {
        let (_dir, store) = temp_store();
        let manager = BackupManager::new(store);
        let err = manager
            .restore(&SessionContext::anonymous(), "missing")
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_anonymous_backup_has_empty_collections() {
        let (_dir, store) = temp_store();
        let manager = BackupManager::new(store);
        let backup = manager
            .create(&SessionContext::anonymous(), BackupKind::Manual)
            .unwrap();
        assert!(backup.data.questions.is_empty());
        assert!(backup.data.sessions.is_empty());
        assert!(backup.data.preferences.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_backup_only_runs_while_logged_in() {
        let (_dir, store) = temp_store();
        let manager = BackupManager::new(store.clone());
        let users = UserRepo::new(store);
        let period = Duration::from_secs(300);

        let handle = spawn_auto_backup(manager.clone(), users.clone(), period);

        // Nobody logged in: a full period passes with no backup.
        tokio::time::sleep(period + Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(manager.list().unwrap().is_empty());

        let user = User::new("Ada", "ada@example.com", "secret1");
        users.upsert(&user).unwrap();
        users.set_current(&user).unwrap();

        tokio::time::sleep(period).await;
        tokio::task::yield_now().await;
        let ledger = manager.list().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, BackupKind::Auto);

        handle.abort();
    }
}
