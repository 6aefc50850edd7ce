//! Global user registry and the current-user slot.

use tracing::debug;

use crate::errors::Result;
use crate::model::User;
use crate::store::keys::{CURRENT_USER_KEY, USERS_KEY};
use crate::store::Store;

/// Repository for the global list of registered users plus the
/// single-value slot holding the currently logged-in user.
#[derive(Debug, Clone)]
pub struct UserRepo {
    store: Store,
}

impl UserRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn get_all(&self) -> Result<Vec<User>> {
        Ok(self.store.get(USERS_KEY)?.unwrap_or_default())
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.get_all()?.into_iter().find(|u| u.id == id))
    }

    /// Look up a user by email, case-insensitively.
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let needle = email.to_lowercase();
        Ok(self
            .get_all()?
            .into_iter()
            .find(|u| u.email.to_lowercase() == needle))
    }

    /// Insert or replace a user by id.
    ///
    /// When the saved user is also the current user, the current-user slot
    /// is updated in the same call so both copies stay consistent.
    pub fn upsert(&self, user: &User) -> Result<()> {
        let mut users = self.get_all()?;
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(slot) => *slot = user.clone(),
            None => users.push(user.clone()),
        }
        self.store.set(USERS_KEY, &users)?;

        if let Some(current) = self.current()? {
            if current.id == user.id {
                self.store.set(CURRENT_USER_KEY, user)?;
            }
        }
        debug!(user_id = %user.id, "saved user");
        Ok(())
    }

    /// Delete a user by id. Returns whether a user was actually removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut users = self.get_all()?;
        let before = users.len();
        users.retain(|u| u.id != id);
        if users.len() == before {
            return Ok(false);
        }
        self.store.set(USERS_KEY, &users)?;

        if let Some(current) = self.current()? {
            if current.id == id {
                self.clear_current()?;
            }
        }
        Ok(true)
    }

    /// The currently logged-in user, if any.
    pub fn current(&self) -> Result<Option<User>> {
        Ok(self.store.get(CURRENT_USER_KEY)?)
    }

    pub fn set_current(&self, user: &User) -> Result<()> {
        self.store.set(CURRENT_USER_KEY, user)?;
        Ok(())
    }

    pub fn clear_current(&self) -> Result<()> {
        self.store.remove(CURRENT_USER_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_repo() -> (tempfile::TempDir, UserRepo) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path(), None).expect("open store");
        (dir, UserRepo::new(store))
    }

    #[test]
    fn test_upsert_appends_then_replaces() {
        let (_dir, repo) = temp_repo();
        let mut user = User::new("Ada", "ada@example.com", "secret1");
        repo.upsert(&user).unwrap();
        assert_eq!(repo.get_all().unwrap().len(), 1);

        user.name = "Ada L".to_string();
        repo.upsert(&user).unwrap();
        let all = repo.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Ada L");
    }

    #[test]
    fn test_find_by_email_is_case_insensitive() {
        let (_dir, repo) = temp_repo();
        repo.upsert(&User::new("Ada", "Ada@Example.COM", "secret1"))
            .unwrap();
        let found = repo.find_by_email("ADA@example.com").unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn test_upsert_mirrors_current_user_slot() {
        let (_dir, repo) = temp_repo();
        let mut user = User::new("Ada", "ada@example.com", "secret1");
        repo.upsert(&user).unwrap();
        repo.set_current(&user).unwrap();

        user.stats.questions_answered = 7;
        repo.upsert(&user).unwrap();

        let current = repo.current().unwrap().unwrap();
        assert_eq!(current.stats.questions_answered, 7);
    }

    #[test]
    fn test_delete_missing_user_reports_false() {
        let (_dir, repo) = temp_repo();
        assert!(!repo.delete("nope").unwrap());
    }

    #[test]
    fn test_delete_current_user_logs_out() {
        let (_dir, repo) = temp_repo();
        let user = User::new("Ada", "ada@example.com", "secret1");
        repo.upsert(&user).unwrap();
        repo.set_current(&user).unwrap();

        assert!(repo.delete(&user.id).unwrap());
        assert!(repo.current().unwrap().is_none());
    }
}
