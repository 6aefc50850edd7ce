//! Quizforge - AI-powered quiz generation and timed study sessions
//!
//! A local-first quiz application: study material goes in, questions come
//! out of a generation API, and everything is drilled in timed study
//! sessions. All state lives in a key-value store backed by plain JSON
//! files in the user's data directory.
//!
//! Layering, bottom up:
//! - [`store`]: the key-value adapter plus key namespacing and change events
//! - [`model`]: the typed entity records
//! - [`repo`]: per-collection repositories over the store
//! - [`auth`], [`study`], [`generate`], [`backup`], [`transfer`],
//!   [`gamification`]: the feature services
//! - [`cli`]: the command-line surface

pub mod auth;
pub mod backup;
pub mod cli;
pub mod config;
pub mod errors;
pub mod gamification;
pub mod generate;
pub mod model;
pub mod repo;
pub mod store;
pub mod study;
pub mod telemetry;
pub mod transfer;

pub use errors::{QuizforgeError, Result};
pub use store::keys::SessionContext;
pub use store::Store;
