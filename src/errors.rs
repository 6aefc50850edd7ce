use thiserror::Error;

/// The central error type for quizforge.
///
/// This hierarchy enables programmatic recovery and unified error handling
/// across the store, repositories, auth, study, and generation layers.
/// Everything is caught at the CLI boundary and rendered as a user-facing
/// message; nothing here crashes the application.
#[derive(Error, Debug)]
pub enum QuizforgeError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Study session error: {0}")]
    Study(#[from] StudyError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures of the key-value store adapter.
///
/// `QuotaExceeded` and corrupt-value discard are recoverable: the write is
/// dropped (with a warning) or the corrupt key deleted. `Unavailable` is
/// fatal to all persistence features and surfaced once at startup.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage is unavailable: {0}")]
    Unavailable(String),

    #[error("storage quota exceeded ({used} of {limit} bytes in use); back up or clear old data")]
    QuotaExceeded { used: u64, limit: u64 },

    #[error("failed to serialize value for key '{key}': {message}")]
    Serialization { key: String, message: String },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("incorrect email or password")]
    InvalidCredentials,

    #[error("this email is already registered")]
    DuplicateEmail,

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("password must be at least {minimum} characters")]
    WeakPassword { minimum: usize },

    #[error("name must be at least {minimum} characters")]
    NameTooShort { minimum: usize },

    #[error("no user is logged in")]
    NotLoggedIn,
}

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("no questions available with the selected filters")]
    NoQuestionsAvailable,

    #[error("invalid study session transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("no question at the current position")]
    NoCurrentQuestion,
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("backup '{0}' not found")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("content too short to generate questions ({length} chars, need at least {minimum})")]
    InsufficientContent { length: usize, minimum: usize },

    #[error("network error calling the generation API: {0}")]
    Network(String),

    #[error("generation API returned status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("AI response was not valid question JSON: {0}")]
    MalformedResponse(String),

    #[error("the AI produced no questions")]
    Empty,
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("invalid import file: {0}")]
    InvalidFormat(String),
}

pub type Result<T> = std::result::Result<T, QuizforgeError>;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_AUTH_ERROR: u8 = 3;
pub const EXIT_GENERATION_ERROR: u8 = 4;
pub const EXIT_STORAGE_ERROR: u8 = 5;

/// Determine the appropriate process exit code for an error.
pub fn get_exit_code(e: &anyhow::Error) -> u8 {
    if let Some(err) = e.downcast_ref::<QuizforgeError>() {
        return match err {
            QuizforgeError::Config(_) => EXIT_CONFIG_ERROR,
            QuizforgeError::Auth(_) => EXIT_AUTH_ERROR,
            QuizforgeError::Generation(_) => EXIT_GENERATION_ERROR,
            QuizforgeError::Storage(_) => EXIT_STORAGE_ERROR,
            _ => EXIT_ERROR,
        };
    }

    // Direct enum unwraps fallback
    if e.downcast_ref::<AuthError>().is_some() {
        return EXIT_AUTH_ERROR;
    }
    if e.downcast_ref::<GenerationError>().is_some() {
        return EXIT_GENERATION_ERROR;
    }
    if e.downcast_ref::<StorageError>().is_some() {
        return EXIT_STORAGE_ERROR;
    }

    EXIT_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_config_error() {
        let err: anyhow::Error = QuizforgeError::Config("missing data dir".to_string()).into();
        assert_eq!(get_exit_code(&err), EXIT_CONFIG_ERROR);
    }

    #[test]
    fn test_exit_code_auth_error_wrapped() {
        let err: anyhow::Error = QuizforgeError::Auth(AuthError::InvalidCredentials).into();
        assert_eq!(get_exit_code(&err), EXIT_AUTH_ERROR);
    }

    #[test]
    fn test_exit_code_auth_error_direct() {
        let err: anyhow::Error = AuthError::DuplicateEmail.into();
        assert_eq!(get_exit_code(&err), EXIT_AUTH_ERROR);
    }

    #[test]
    fn test_exit_code_generation_error() {
        let err: anyhow::Error = QuizforgeError::Generation(GenerationError::Empty).into();
        assert_eq!(get_exit_code(&err), EXIT_GENERATION_ERROR);
    }

    #[test]
    fn test_exit_code_storage_error() {
        let err: anyhow::Error = QuizforgeError::Storage(StorageError::QuotaExceeded {
            used: 5_000_000,
            limit: 5_000_000,
        })
        .into();
        assert_eq!(get_exit_code(&err), EXIT_STORAGE_ERROR);
    }

    #[test]
    fn test_exit_code_study_error_is_generic() {
        let err: anyhow::Error = QuizforgeError::Study(StudyError::NoQuestionsAvailable).into();
        assert_eq!(get_exit_code(&err), EXIT_ERROR);
    }

    #[test]
    fn test_exit_code_plain_anyhow_default() {
        let err = anyhow::anyhow!("something completely unexpected happened");
        assert_eq!(get_exit_code(&err), EXIT_ERROR);
    }

    #[test]
    fn test_quota_error_message_mentions_backup() {
        let err = StorageError::QuotaExceeded {
            used: 100,
            limit: 100,
        };
        assert!(err.to_string().contains("back up"));
    }
}
