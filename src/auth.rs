//! Registration, login, and session lifecycle.
//!
//! Credentials are stored and compared in plaintext. That mirrors the
//! system this replaces and is a documented weakness, not an oversight;
//! treat the data directory as sensitive.

use chrono::Utc;
use tracing::info;

use crate::errors::{AuthError, Result};
use crate::model::User;
use crate::repo::UserRepo;
use crate::store::keys::SessionContext;
use crate::store::Store;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;

/// Password strength bucket from the five-check score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordStrength {
    VeryWeak,
    Weak,
    Fair,
    Good,
    Strong,
}

impl std::fmt::Display for PasswordStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordStrength::VeryWeak => write!(f, "very weak"),
            PasswordStrength::Weak => write!(f, "weak"),
            PasswordStrength::Fair => write!(f, "fair"),
            PasswordStrength::Good => write!(f, "good"),
            PasswordStrength::Strong => write!(f, "strong"),
        }
    }
}

/// Score a password against five independent checks: length ≥ 8,
/// lowercase, uppercase, digit, special character.
pub fn password_strength(password: &str) -> PasswordStrength {
    let checks = [
        password.chars().count() >= 8,
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];
    match checks.iter().filter(|&&ok| ok).count() {
        0 | 1 => PasswordStrength::VeryWeak,
        2 => PasswordStrength::Weak,
        3 => PasswordStrength::Fair,
        4 => PasswordStrength::Good,
        _ => PasswordStrength::Strong,
    }
}

/// Minimal structural email check: one `@` with a dotted domain after it.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !tld.is_empty() && !domain.contains(' ') && !local.contains(' ')
}

#[derive(Debug, Clone)]
pub struct AuthService {
    users: UserRepo,
}

impl AuthService {
    pub fn new(store: Store) -> Self {
        Self {
            users: UserRepo::new(store),
        }
    }

    /// Register a new user and log them in.
    pub fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<User> {
        let name = name.trim();
        let email = email.trim();

        if name.chars().count() < MIN_NAME_LEN {
            return Err(AuthError::NameTooShort {
                minimum: MIN_NAME_LEN,
            }
            .into());
        }
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail.into());
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                minimum: MIN_PASSWORD_LEN,
            }
            .into());
        }
        if password != confirm_password {
            return Err(AuthError::PasswordMismatch.into());
        }
        if self.users.find_by_email(email)?.is_some() {
            return Err(AuthError::DuplicateEmail.into());
        }

        let user = User::new(name, email, password);
        self.users.upsert(&user)?;
        self.users.set_current(&user)?;
        info!(user_id = %user.id, "registered new user");
        Ok(user)
    }

    /// Log in with email and password.
    ///
    /// A failed login changes no state; a successful one updates
    /// `last_login` and fills the current-user slot.
    pub fn login(&self, email: &str, password: &str) -> Result<User> {
        let mut user = self
            .users
            .find_by_email(email.trim())?
            .ok_or(AuthError::InvalidCredentials)?;
        if user.password != password {
            return Err(AuthError::InvalidCredentials.into());
        }

        user.last_login = Utc::now();
        self.users.upsert(&user)?;
        self.users.set_current(&user)?;
        info!(user_id = %user.id, "user logged in");
        Ok(user)
    }

    pub fn logout(&self) -> Result<()> {
        self.users.clear_current()?;
        info!("user logged out");
        Ok(())
    }

    /// The current session context: the logged-in user's, or anonymous.
    pub fn context(&self) -> Result<SessionContext> {
        Ok(match self.users.current()? {
            Some(user) => SessionContext::for_user(user.id),
            None => SessionContext::anonymous(),
        })
    }

    pub fn current_user(&self) -> Result<Option<User>> {
        self.users.current()
    }

    /// The current user, or `NotLoggedIn` for flows that require one.
    pub fn require_user(&self) -> Result<User> {
        self.users.current()?.ok_or_else(|| AuthError::NotLoggedIn.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_auth() -> (tempfile::TempDir, AuthService, UserRepo) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path(), None).expect("open store");
        (dir, AuthService::new(store.clone()), UserRepo::new(store))
    }

    #[test]
    fn test_register_logs_the_user_in() {
        let (_dir, auth, users) = temp_auth();
        let user = auth
            .register("Ada", "ada@example.com", "secret1", "secret1")
            .unwrap();
        assert_eq!(users.current().unwrap().unwrap().id, user.id);
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn test_register_rejects_short_name() {
        let (_dir, auth, _) = temp_auth();
        let err = auth
            .register("A", "a@example.com", "secret1", "secret1")
            .unwrap_err();
        assert!(err.to_string().contains("at least 2"));
    }

    #[test]
    fn test_register_rejects_bad_email() {
        let (_dir, auth, _) = temp_auth();
        for bad in ["not-an-email", "a@b", "@example.com", "a b@example.com"] {
            assert!(auth.register("Ada", bad, "secret1", "secret1").is_err());
        }
    }

    #[test]
    fn test_register_rejects_short_or_mismatched_password() {
        let (_dir, auth, _) = temp_auth();
        assert!(auth
            .register("Ada", "ada@example.com", "short", "short")
            .is_err());
        assert!(auth
            .register("Ada", "ada@example.com", "secret1", "secret2")
            .is_err());
    }

    #[test]
    fn test_register_rejects_duplicate_email_case_insensitively() {
        let (_dir, auth, _) = temp_auth();
        auth.register("Ada", "ada@example.com", "secret1", "secret1")
            .unwrap();
        let err = auth
            .register("Other", "ADA@EXAMPLE.COM", "secret1", "secret1")
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_login_updates_last_login() {
        let (_dir, auth, users) = temp_auth();
        let registered = auth
            .register("Ada", "ada@example.com", "secret1", "secret1")
            .unwrap();
        auth.logout().unwrap();

        let logged_in = auth.login("ada@example.com", "secret1").unwrap();
        assert!(logged_in.last_login >= registered.last_login);
        assert!(users.current().unwrap().is_some());
    }

    #[test]
    fn test_failed_login_changes_no_state() {
        let (_dir, auth, users) = temp_auth();
        auth.register("Ada", "ada@example.com", "secret1", "secret1")
            .unwrap();
        auth.logout().unwrap();
        let before = users.get_all().unwrap();

        let err = auth.login("ada@example.com", "wrong").unwrap_err();
        assert!(err.to_string().contains("incorrect email or password"));
        assert!(users.current().unwrap().is_none());
        assert_eq!(users.get_all().unwrap(), before);
    }

    #[test]
    fn test_login_unknown_email_same_error_as_wrong_password() {
        let (_dir, auth, _) = temp_auth();
        let unknown = auth.login("nobody@example.com", "x").unwrap_err();
        assert!(unknown.to_string().contains("incorrect email or password"));
    }

    #[test]
    fn test_context_follows_session() {
        let (_dir, auth, _) = temp_auth();
        assert!(!auth.context().unwrap().is_authenticated());
        auth.register("Ada", "ada@example.com", "secret1", "secret1")
            .unwrap();
        assert!(auth.context().unwrap().is_authenticated());
        auth.logout().unwrap();
        assert!(!auth.context().unwrap().is_authenticated());
    }

    #[test]
    fn test_password_strength_buckets() {
        assert_eq!(password_strength(""), PasswordStrength::VeryWeak);
        assert_eq!(password_strength("abc"), PasswordStrength::VeryWeak);
        assert_eq!(password_strength("abcdefgh"), PasswordStrength::Weak);
        assert_eq!(password_strength("Abcdefgh"), PasswordStrength::Fair);
        assert_eq!(password_strength("Abcdefg1"), PasswordStrength::Good);
        assert_eq!(password_strength("Abcdef1!"), PasswordStrength::Strong);
    }
}
