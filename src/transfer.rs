//! Export, import, and bulk data management.
//!
//! Export bundles the user registry plus the active user's collections into
//! a single versioned JSON document. Import validates the bundle shape,
//! takes a safety backup, and then replaces whichever collections the
//! bundle carries. Clearing data likewise snapshots before destroying.

use chrono::{DateTime, Utc};

use crate::backup::BackupManager;
use crate::errors::{ImportError, Result};
use crate::model::{BackupKind, ExportBundle, EXPORT_VERSION};
use crate::store::keys::{Collection, SessionContext, USERS_KEY};
use crate::store::Store;
use tracing::info;

/// Snapshot of what the store currently holds, for the stats display.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageReport {
    pub users: usize,
    pub questions: usize,
    pub sessions: usize,
    pub backups: usize,
    pub total_bytes: u64,
    pub last_backup: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TransferService {
    store: Store,
    backups: BackupManager,
}

impl TransferService {
    pub fn new(store: Store) -> Self {
        let backups = BackupManager::new(store.clone());
        Self { store, backups }
    }

    /// Bundle the registry and the active user's collections for export.
    pub fn export(&self, ctx: &SessionContext) -> Result<ExportBundle> {
        let users = self.store.get(USERS_KEY)?.unwrap_or_default();
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

        Ok(ExportBundle {
            version: EXPORT_VERSION.to_string(),
            timestamp: Some(Utc::now()),
            users: Some(users),
            questions: Some(questions),
            sessions: Some(sessions),
            preferences,
        })
    }

    /// Validate and apply an export bundle.
    ///
    /// A pre-import backup is taken first so a bad import can be undone.
    /// Only the collections present in the bundle are replaced.
    pub fn import(&self, ctx: &SessionContext, bundle: &ExportBundle) -> Result<()> {
        if bundle.version.is_empty() {
            return Err(ImportError::InvalidFormat("missing version field".to_string()).into());
        }
        let has_any = bundle.users.is_some()
            || bundle.questions.is_some()
            || bundle.sessions.is_some()
            || bundle.preferences.is_some();
        if !has_any {
            return Err(ImportError::InvalidFormat(
                "no recognized collections in the file".to_string(),
            )
            .into());
        }

        self.backups.create(ctx, BackupKind::PreImport)?;

        if let Some(users) = &bundle.users {
            self.store.set(USERS_KEY, users)?;
        }
        if let Some(questions) = &bundle.questions {
            if let Some(key) = ctx.collection_key(Collection::Questions) {
                self.store.set(&key, questions)?;
            }
        }
        if let Some(sessions) = &bundle.sessions {
            if let Some(key) = ctx.collection_key(Collection::Sessions) {
                self.store.set(&key, sessions)?;
            }
        }
        if let Some(preferences) = &bundle.preferences {
            if let Some(key) = ctx.collection_key(Collection::Preferences) {
                self.store.set(&key, preferences)?;
            }
        }

        info!(version = %bundle.version, "imported data bundle");
        Ok(())
    }

    /// Destroy every application key after taking a final backup.
    ///
    /// The pre-clear backup is deliberately written after the wipe so it
    /// survives as the only remaining key.
    pub fn clear_all(&self, ctx: &SessionContext) -> Result<()> {
        let snapshot = self.backups.create(ctx, BackupKind::PreClear)?;
        for key in self.store.keys()? {
            self.store.remove(&key)?;
        }
        self.store
            .set(crate::store::keys::BACKUPS_KEY, &vec![snapshot])?;
        info!("cleared all stored data");
        Ok(())
    }

    /// Remove one user entirely: the registry record, the current-user slot
    /// when it is theirs, and every partitioned collection.
    pub fn clear_user_data(&self, user_id: &str) -> Result<()> {
        crate::repo::UserRepo::new(self.store.clone()).delete(user_id)?;
        for collection in Collection::all() {
            let key = crate::store::keys::user_collection_key(user_id, collection);
            self.store.remove(&key)?;
        }
        info!(user_id, "removed user and their collections");
        Ok(())
    }

    /// Counts and sizes for the stats display.
    pub fn report(&self, ctx: &SessionContext) -> Result<StorageReport> {
        let users: Vec<serde_json::Value> = self.store.get(USERS_KEY)?.unwrap_or_default();
        let questions: Vec<serde_json::Value> = match ctx.collection_key(Collection::Questions) {
            Some(key) => self.store.get(&key)?.unwrap_or_default(),
            None => Vec::new(),
        };
        let sessions: Vec<serde_json::Value> = match ctx.collection_key(Collection::Sessions) {
            Some(key) => self.store.get(&key)?.unwrap_or_default(),
            None => Vec::new(),
        };
        let ledger = self.backups.list()?;

        Ok(StorageReport {
            users: users.len(),
            questions: questions.len(),
            sessions: sessions.len(),
            backups: ledger.len(),
            total_bytes: self.store.total_bytes()?,
            last_backup: ledger.last().map(|b| b.timestamp),
        })
    }
}

/// Human-readable byte count, base 1024.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Question, QuestionBody, User};
    use crate::repo::{QuestionRepo, UserRepo};

    fn fixture() -> (tempfile::TempDir, TransferService, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path(), None).expect("open store");
        (dir, TransferService::new(store.clone()), store)
    }

    fn seed(store: &Store) -> (SessionContext, User) {
        let users = UserRepo::new(store.clone());
        let questions = QuestionRepo::new(store.clone());
        let user = User::new("Ada", "ada@example.com", "secret1");
        users.upsert(&user).unwrap();
        let ctx = SessionContext::for_user(user.id.clone());
        questions
            .upsert(
                &ctx,
                &Question::new(
                    "q1",
                    QuestionBody::TrueFalse { answer: true },
                    Difficulty::Easy,
                    "pasted text",
                ),
            )
            .unwrap();
        (ctx, user)
    }

    #[test]
    fn test_export_import_round_trip() {
        let (_dir, service, store) = fixture();
        let (ctx, _user) = seed(&store);
        let bundle = service.export(&ctx).unwrap();
        assert_eq!(bundle.version, EXPORT_VERSION);

        // Wipe and bring everything back from the bundle.
        service.clear_all(&ctx).unwrap();
        service.import(&ctx, &bundle).unwrap();

        let after = service.export(&ctx).unwrap();
        assert_eq!(after.users, bundle.users);
        assert_eq!(after.questions, bundle.questions);
        assert_eq!(after.sessions, bundle.sessions);
    }

    #[test]
    fn test_import_rejects_missing_version() {
        let (_dir, service, _store) = fixture();
        let bundle = ExportBundle {
            users: Some(Vec::new()),
            ..ExportBundle::default()
        };
        let err = service
            .import(&SessionContext::anonymous(), &bundle)
            .unwrap_err();
        assert!(err.to_string().contains("missing version"));
    }

    #[test]
    fn test_import_rejects_empty_bundle() {
        let (_dir, service, _store) = fixture();
        let bundle = ExportBundle {
            version: EXPORT_VERSION.to_string(),
            ..ExportBundle::default()
        };
        let err = service
            .import(&SessionContext::anonymous(), &bundle)
            .unwrap_err();
        assert!(err.to_string().contains("no recognized collections"));
    }

    #[test]
    fn test_import_takes_a_pre_import_backup() {
        let (_dir, service, store) = fixture();
        let (ctx, _user) = seed(&store);
        let bundle = service.export(&ctx).unwrap();
        service.import(&ctx, &bundle).unwrap();

        let ledger = BackupManager::new(store).list().unwrap();
        assert!(ledger.iter().any(|b| b.kind == BackupKind::PreImport));
    }

    #[test]
    fn test_clear_all_leaves_only_the_pre_clear_backup() {
        let (_dir, service, store) = fixture();
        let (ctx, _user) = seed(&store);
        service.clear_all(&ctx).unwrap();

        let keys = store.keys().unwrap();
        assert_eq!(keys, vec![crate::store::keys::BACKUPS_KEY.to_string()]);
        let ledger = BackupManager::new(store).list().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, BackupKind::PreClear);
        assert_eq!(ledger[0].data.users.len(), 1);
    }

    #[test]
    fn test_clear_user_data_removes_only_that_user() {
        let (_dir, service, store) = fixture();
        let (ctx, user) = seed(&store);
        let questions = QuestionRepo::new(store);
        let other = SessionContext::for_user("other");
        questions
            .upsert(
                &other,
                &Question::new(
                    "q2",
                    QuestionBody::Essay,
                    Difficulty::Medium,
                    "pasted text",
                ),
            )
            .unwrap();

        service.clear_user_data(&user.id).unwrap();
        assert!(questions.get_all(&ctx).unwrap().is_empty());
        assert_eq!(questions.get_all(&other).unwrap().len(), 1);
        assert!(UserRepo::new(service.store.clone())
            .get_by_id(&user.id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_report_counts_collections() {
        let (_dir, service, store) = fixture();
        let (ctx, _user) = seed(&store);
        let report = service.report(&ctx).unwrap();
        assert_eq!(report.users, 1);
        assert_eq!(report.questions, 1);
        assert_eq!(report.sessions, 0);
        assert!(report.total_bytes > 0);
    }

    #[test]
    fn test_format_bytes_ladder() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
