//! Entity repositories over the key-value store.
//!
//! Each repository owns one storage key (global) or one per-user collection
//! (resolved through [`SessionContext`]). Writes against an anonymous
//! context are dropped and reported as `Ok(false)` with a warning; reads
//! come back empty. Only real storage failures become errors.

mod preferences;
mod questions;
mod sessions;
mod users;

pub use preferences::PreferencesRepo;
pub use questions::QuestionRepo;
pub use sessions::SessionRepo;
pub use users::UserRepo;
