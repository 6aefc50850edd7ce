//! Entity records persisted by the repositories.
//!
//! The wire format (camelCase field names, kebab-case type tags) matches the
//! JSON layout described in the external-interface contract, so exported
//! bundles remain interchangeable. Question bodies are a sum type rather
//! than a bag of optional fields: the variant carries exactly the data its
//! kind needs, validated when it crosses the store boundary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a fresh entity id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ─── Users ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Stored and compared in plaintext. A known weakness of the system,
    /// kept deliberately; see the error-handling contract.
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub preferences: UserPreferences,
    #[serde(default)]
    pub stats: UserStats,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            email: email.into().to_lowercase(),
            password: password.into(),
            created_at: now,
            last_login: now,
            profile: Profile::default(),
            preferences: UserPreferences::default(),
            stats: UserStats::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default = "default_true")]
    pub auto_save: bool,
    /// Ids of questions the user marked as favorites.
    #[serde(default)]
    pub favorites: Vec<String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            dark_mode: false,
            notifications: true,
            auto_save: true,
            favorites: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Cumulative per-user statistics, updated by generation and study flows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    #[serde(default)]
    pub questions_generated: u64,
    #[serde(default)]
    pub questions_answered: u64,
    #[serde(default)]
    pub correct_answers: u64,
    #[serde(default)]
    pub documents_processed: u64,
    #[serde(default)]
    pub study_sessions: u64,
    /// Total study time in seconds.
    #[serde(default)]
    pub total_study_time: u64,
    /// Overall accuracy percentage, rounded to the nearest integer.
    #[serde(default)]
    pub accuracy: u32,
    #[serde(default)]
    pub total_points: u64,
    #[serde(default)]
    pub best_streak: u64,
    #[serde(default)]
    pub average_time: u64,
}

// ─── Questions ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

/// Type-specific question content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionBody {
    #[serde(rename_all = "camelCase")]
    MultipleChoice {
        options: Vec<String>,
        /// Index into `options` of the single correct alternative.
        correct_index: usize,
    },
    TrueFalse {
        answer: bool,
    },
    Essay,
}

impl QuestionBody {
    pub fn kind_name(&self) -> &'static str {
        match self {
            QuestionBody::MultipleChoice { .. } => "multiple-choice",
            QuestionBody::TrueFalse { .. } => "true-false",
            QuestionBody::Essay => "essay",
        }
    }
}

/// An answer a user gave to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserAnswer {
    Choice(usize),
    Bool(bool),
    Text(String),
}

/// Mutable answer state carried on each question.
///
/// `answered` is false at creation and flips true when the question is
/// answered in a study session; re-answering is allowed and overwrites.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerState {
    #[serde(default)]
    pub answered: bool,
    #[serde(default)]
    pub user_answer: Option<UserAnswer>,
    #[serde(default)]
    pub correct: Option<bool>,
    /// Session clock reading, in seconds, when the answer was recorded.
    #[serde(default)]
    pub time_spent: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub question: String,
    #[serde(flatten)]
    pub body: QuestionBody,
    #[serde(default)]
    pub explanation: String,
    pub difficulty: Difficulty,
    /// Where the question came from (file name or "pasted text").
    pub source: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: AnswerState,
}

impl Question {
    pub fn new(
        text: impl Into<String>,
        body: QuestionBody,
        difficulty: Difficulty,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            question: text.into(),
            body,
            explanation: String::new(),
            difficulty,
            source: source.into(),
            created_at: Utc::now(),
            state: AnswerState::default(),
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }
}

// ─── Generation sessions ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    Essay,
    /// Let the generator vary the type per question.
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FocusArea {
    General,
    Concepts,
    Details,
    Application,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Standard,
    Complex,
    Contextual,
}

/// Knobs for one question-generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub count: usize,
    pub difficulty: Difficulty,
    pub kind: QuestionKind,
    pub focus: FocusArea,
    /// Number of alternatives for multiple-choice questions.
    pub alternatives: usize,
    pub complexity: Complexity,
    pub contextual: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            count: 10,
            difficulty: Difficulty::Medium,
            kind: QuestionKind::MultipleChoice,
            focus: FocusArea::General,
            alternatives: 4,
            complexity: Complexity::Standard,
            contextual: false,
        }
    }
}

/// Record of a single question-generation event. Append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSession {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub settings: GenerationSettings,
    pub question_count: usize,
    pub question_ids: Vec<String>,
}

// ─── Study sessions ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StudyMode {
    /// Mix of answered and unanswered questions.
    Practice,
    /// Only unanswered questions, exam simulation.
    Exam,
    /// Only previously incorrectly answered questions.
    Review,
}

impl std::fmt::Display for StudyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StudyMode::Practice => write!(f, "practice"),
            StudyMode::Exam => write!(f, "exam"),
            StudyMode::Review => write!(f, "review"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyConfig {
    /// Countdown length in minutes.
    pub duration_minutes: u64,
    pub question_count: usize,
    /// `None` means all difficulties.
    pub difficulty: Option<Difficulty>,
    pub mode: StudyMode,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            duration_minutes: 30,
            question_count: 20,
            difficulty: None,
            mode: StudyMode::Practice,
        }
    }
}

/// One answered (or skipped) question inside a study session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: String,
    pub user_answer: Option<UserAnswer>,
    pub correct: bool,
    #[serde(default)]
    pub skipped: bool,
    /// Elapsed session seconds when the answer was recorded.
    pub time_spent: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    TimeExpired,
    Completed,
}

/// Aggregate statistics for a finished study session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_questions: usize,
    pub correct_answers: usize,
    pub skipped_questions: usize,
    /// Percentage rounded to the nearest integer.
    pub accuracy: u32,
    /// Total elapsed seconds.
    pub total_time: u64,
    pub average_time_per_question: u64,
}

/// History record appended when a study session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyRecord {
    pub id: String,
    pub date: DateTime<Utc>,
    pub config: StudyConfig,
    pub stats: SessionStats,
    pub end_reason: EndReason,
    pub answers: Vec<AnswerRecord>,
}

/// Entry in a user's session history: either a generation event or a
/// finished study run. Both live in the same `sessions` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionEntry {
    Generation(GenerationSession),
    Study(StudyRecord),
}

impl SessionEntry {
    pub fn id(&self) -> &str {
        match self {
            SessionEntry::Generation(s) => &s.id,
            SessionEntry::Study(s) => &s.id,
        }
    }
}

// ─── Backups ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupKind {
    Manual,
    Auto,
    PreImport,
    PreClear,
}

impl std::fmt::Display for BackupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupKind::Manual => write!(f, "manual"),
            BackupKind::Auto => write!(f, "auto"),
            BackupKind::PreImport => write!(f, "pre-import"),
            BackupKind::PreClear => write!(f, "pre-clear"),
        }
    }
}

/// Deep copy of the entity collections at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub sessions: Vec<SessionEntry>,
    #[serde(default)]
    pub preferences: Option<UserPreferences>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BackupKind,
    pub timestamp: DateTime<Utc>,
    pub data: BackupData,
}

// ─── Export/import ──────────────────────────────────────────────────

pub const EXPORT_VERSION: &str = "1.0";

/// On-disk export bundle. Import requires `version` plus at least one of
/// the recognized collections to be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<User>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Question>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<SessionEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<UserPreferences>,
}

// ─── Gamification ───────────────────────────────────────────────────

/// Per-user gamification state, stored under the `gamification` collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationStats {
    #[serde(default)]
    pub total_questions: u64,
    #[serde(default)]
    pub correct_answers: u64,
    #[serde(default)]
    pub current_streak: u64,
    #[serde(default)]
    pub best_streak: u64,
    #[serde(default)]
    pub daily_streak: u64,
    #[serde(default)]
    pub last_active_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_points: u64,
    #[serde(default)]
    pub level: u64,
    /// Ids of unlocked achievements, in unlock order.
    #[serde(default)]
    pub achievements: Vec<String>,
}
