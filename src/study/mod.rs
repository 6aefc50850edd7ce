//! Timed study sessions.
//!
//! A session moves through a small state machine: it is created `Running`,
//! may alternate `Running` ⇄ `Paused`, and ends exactly once (`Ended`),
//! either because the countdown expired or because every question was
//! answered or skipped. The countdown clock only advances while running;
//! paused time is banked and excluded from every elapsed-time figure.
//!
//! Grading is immediate on submission and the updated answer state is
//! written back to the question collection, so review mode sees it on the
//! very next session.

pub mod query;

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info};

use crate::errors::{Result, StudyError};
use crate::model::{
    new_id, AnswerRecord, EndReason, Question, QuestionBody, SessionEntry, SessionStats,
    StudyConfig, StudyRecord, UserAnswer,
};
use crate::repo::{QuestionRepo, SessionRepo, UserRepo};
use crate::store::keys::SessionContext;
use crate::store::Store;

/// Minimum trimmed length for an essay answer to count as correct.
///
/// Deliberately crude: a real grader would evaluate content, this one only
/// rejects answers too short to be an attempt.
pub const ESSAY_MIN_ANSWER_CHARS: usize = 20;

/// Phase of an existing session.
///
/// The conceptual idle and configuring steps that precede a run have no
/// variants here: while they last, no [`StudySession`] value exists yet.
/// Idle is "no session", configuring is building a [`StudyConfig`] for
/// [`StudyService::start`], which hands back a session already `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyPhase {
    Running,
    Paused,
    Ended,
}

impl std::fmt::Display for StudyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StudyPhase::Running => write!(f, "running"),
            StudyPhase::Paused => write!(f, "paused"),
            StudyPhase::Ended => write!(f, "ended"),
        }
    }
}

/// Grade one answer against the question body.
///
/// An answer of the wrong shape for the question type is simply incorrect,
/// never an error.
pub fn grade(body: &QuestionBody, answer: &UserAnswer) -> bool {
    match (body, answer) {
        (QuestionBody::MultipleChoice { correct_index, .. }, UserAnswer::Choice(picked)) => {
            picked == correct_index
        }
        (QuestionBody::TrueFalse { answer: expected }, UserAnswer::Bool(given)) => {
            given == expected
        }
        (QuestionBody::Essay, UserAnswer::Text(text)) => {
            text.trim().chars().count() > ESSAY_MIN_ANSWER_CHARS
        }
        _ => false,
    }
}

/// An in-flight study session.
#[derive(Debug)]
pub struct StudySession {
    id: String,
    config: StudyConfig,
    questions: Vec<Question>,
    position: usize,
    answers: Vec<AnswerRecord>,
    phase: StudyPhase,
    started_at: chrono::DateTime<Utc>,
    /// Running time banked before the most recent resume.
    banked: Duration,
    /// When the session (re)entered `Running`; `None` while paused/ended.
    resumed_at: Option<Instant>,
}

impl StudySession {
    fn new(config: StudyConfig, questions: Vec<Question>) -> Self {
        Self {
            id: new_id(),
            config,
            questions,
            position: 0,
            answers: Vec::new(),
            phase: StudyPhase::Running,
            started_at: Utc::now(),
            banked: Duration::ZERO,
            resumed_at: Some(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> StudyPhase {
        self.phase
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// Total questions drawn into this session.
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Zero-based index of the current question.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.position)
    }

    /// Every question answered or skipped.
    pub fn is_complete(&self) -> bool {
        self.position >= self.questions.len()
    }

    /// Session time spent running (paused time excluded).
    pub fn elapsed(&self) -> Duration {
        match self.resumed_at {
            Some(since) => self.banked + since.elapsed(),
            None => self.banked,
        }
    }

    /// Time left on the countdown.
    pub fn remaining(&self) -> Duration {
        Duration::from_secs(self.config.duration_minutes * 60).saturating_sub(self.elapsed())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.phase != StudyPhase::Running {
            return Err(invalid_transition(self.phase, StudyPhase::Paused));
        }
        if let Some(since) = self.resumed_at.take() {
            self.banked += since.elapsed();
        }
        self.phase = StudyPhase::Paused;
        debug!(session_id = %self.id, "study session paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.phase != StudyPhase::Paused {
            return Err(invalid_transition(self.phase, StudyPhase::Running));
        }
        self.resumed_at = Some(Instant::now());
        self.phase = StudyPhase::Running;
        debug!(session_id = %self.id, "study session resumed");
        Ok(())
    }

    /// Submit an answer for the current question.
    ///
    /// Grades immediately, records the answer, advances to the next
    /// question, and returns the question with its updated answer state so
    /// the caller can persist it.
    pub fn submit(&mut self, answer: UserAnswer) -> Result<(AnswerRecord, Question)> {
        self.require_running()?;
        // Answers carry the session clock at the moment of answering.
        let time_spent = self.elapsed().as_secs();
        let question = self
            .questions
            .get_mut(self.position)
            .ok_or(StudyError::NoCurrentQuestion)?;

        let correct = grade(&question.body, &answer);

        question.state.answered = true;
        question.state.user_answer = Some(answer.clone());
        question.state.correct = Some(correct);
        question.state.time_spent = time_spent;

        let record = AnswerRecord {
            question_id: question.id.clone(),
            user_answer: Some(answer),
            correct,
            skipped: false,
            time_spent,
        };
        let updated = question.clone();
        self.answers.push(record.clone());
        self.position += 1;
        Ok((record, updated))
    }

    /// Skip the current question. A skipped question counts against
    /// accuracy but leaves the question's stored answer state untouched.
    pub fn skip(&mut self) -> Result<AnswerRecord> {
        self.require_running()?;
        let question = self
            .questions
            .get(self.position)
            .ok_or(StudyError::NoCurrentQuestion)?;

        let record = AnswerRecord {
            question_id: question.id.clone(),
            user_answer: None,
            correct: false,
            skipped: true,
            time_spent: self.elapsed().as_secs(),
        };
        self.answers.push(record.clone());
        self.position += 1;
        Ok(record)
    }

    fn require_running(&self) -> Result<()> {
        if self.phase != StudyPhase::Running {
            return Err(invalid_transition(self.phase, StudyPhase::Running));
        }
        Ok(())
    }

    /// Aggregate statistics over the answers recorded so far.
    pub fn stats(&self) -> SessionStats {
        let total = self.answers.len();
        let correct = self.answers.iter().filter(|a| a.correct).count();
        let skipped = self.answers.iter().filter(|a| a.skipped).count();
        let total_time = self.elapsed().as_secs();
        SessionStats {
            total_questions: total,
            correct_answers: correct,
            skipped_questions: skipped,
            accuracy: percentage(correct as u64, total as u64),
            total_time,
            average_time_per_question: if total == 0 {
                0
            } else {
                ((total_time as f64) / (total as f64)).round() as u64
            },
        }
    }

    fn end(&mut self, reason: EndReason) -> StudyRecord {
        if let Some(since) = self.resumed_at.take() {
            self.banked += since.elapsed();
        }
        self.phase = StudyPhase::Ended;
        StudyRecord {
            id: self.id.clone(),
            date: self.started_at,
            config: self.config.clone(),
            stats: self.stats(),
            end_reason: reason,
            answers: self.answers.clone(),
        }
    }
}

fn invalid_transition(from: StudyPhase, to: StudyPhase) -> crate::errors::QuizforgeError {
    StudyError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
    .into()
}

/// Percentage rounded to the nearest integer; zero when the base is zero.
pub fn percentage(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        0
    } else {
        ((part as f64 / whole as f64) * 100.0).round() as u32
    }
}

/// Orchestrates study sessions against the persistent collections.
#[derive(Debug, Clone)]
pub struct StudyService {
    questions: QuestionRepo,
    sessions: SessionRepo,
    users: UserRepo,
}

impl StudyService {
    pub fn new(store: Store) -> Self {
        Self {
            questions: QuestionRepo::new(store.clone()),
            sessions: SessionRepo::new(store.clone()),
            users: UserRepo::new(store),
        }
    }

    /// Start a session: draw questions matching the config from the user's
    /// collection, shuffle, and truncate to the configured count.
    pub fn start(&self, ctx: &SessionContext, config: StudyConfig) -> Result<StudySession> {
        let pool = self.questions.get_all(ctx)?;
        let query = query::QuestionQuery::new(config.mode, config.difficulty);
        let drawn = query.select(&pool, config.question_count, &mut rand::rng());
        if drawn.is_empty() {
            return Err(StudyError::NoQuestionsAvailable.into());
        }
        info!(
            mode = %config.mode,
            drawn = drawn.len(),
            pool = pool.len(),
            "study session started"
        );
        Ok(StudySession::new(config, drawn))
    }

    /// Submit and persist an answer for the session's current question.
    pub fn submit_answer(
        &self,
        ctx: &SessionContext,
        session: &mut StudySession,
        answer: UserAnswer,
    ) -> Result<AnswerRecord> {
        let (record, updated) = session.submit(answer)?;
        self.questions.upsert(ctx, &updated)?;
        Ok(record)
    }

    pub fn skip(&self, session: &mut StudySession) -> Result<AnswerRecord> {
        session.skip()
    }

    /// End the session, append it to history, and roll its statistics into
    /// the user's cumulative stats.
    pub fn finish(
        &self,
        ctx: &SessionContext,
        mut session: StudySession,
        reason: EndReason,
    ) -> Result<StudyRecord> {
        let record = session.end(reason);
        self.sessions
            .append(ctx, &SessionEntry::Study(record.clone()))?;

        if let Some(user_id) = ctx.user_id() {
            if let Some(mut user) = self.users.get_by_id(user_id)? {
                let stats = &record.stats;
                user.stats.questions_answered += stats.total_questions as u64;
                user.stats.correct_answers += stats.correct_answers as u64;
                user.stats.study_sessions += 1;
                user.stats.total_study_time += stats.total_time;
                user.stats.accuracy =
                    percentage(user.stats.correct_answers, user.stats.questions_answered);
                user.stats.average_time = if user.stats.questions_answered == 0 {
                    0
                } else {
                    ((user.stats.total_study_time as f64)
                        / (user.stats.questions_answered as f64))
                        .round() as u64
                };
                self.users.upsert(&user)?;
            }
        }

        info!(
            session_id = %record.id,
            accuracy = record.stats.accuracy,
            reason = ?record.end_reason,
            "study session ended"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, StudyMode, User};

    fn true_false(answer: bool) -> Question {
        Question::new(
            "q",
            QuestionBody::TrueFalse { answer },
            Difficulty::Medium,
            "pasted text",
        )
    }

    fn session_with(questions: Vec<Question>) -> StudySession {
        StudySession::new(StudyConfig::default(), questions)
    }

    #[test]
    fn test_grade_multiple_choice_by_index() {
        let body = QuestionBody::MultipleChoice {
            options: vec!["a".into(), "b".into()],
            correct_index: 1,
        };
        assert!(grade(&body, &UserAnswer::Choice(1)));
        assert!(!grade(&body, &UserAnswer::Choice(0)));
        // Wrong answer shape is incorrect, not an error.
        assert!(!grade(&body, &UserAnswer::Text("b".into())));
    }

    #[test]
    fn test_grade_essay_by_trimmed_length() {
        assert!(!grade(&QuestionBody::Essay, &UserAnswer::Text("   short   ".into())));
        assert!(grade(
            &QuestionBody::Essay,
            &UserAnswer::Text("a serious attempt at an actual essay answer".into())
        ));
        // Exactly at the threshold is still too short.
        let boundary = "x".repeat(ESSAY_MIN_ANSWER_CHARS);
        assert!(!grade(&QuestionBody::Essay, &UserAnswer::Text(boundary)));
    }

    #[test]
    fn test_submit_updates_question_state_and_advances() {
        let mut session = session_with(vec![true_false(true), true_false(false)]);
        let (record, updated) = session.submit(UserAnswer::Bool(true)).unwrap();

        assert!(record.correct);
        assert!(updated.state.answered);
        assert_eq!(updated.state.correct, Some(true));
        assert_eq!(session.position(), 1);
    }

    #[test]
    fn test_skip_counts_but_leaves_question_unanswered() {
        let mut session = session_with(vec![true_false(true)]);
        let record = session.skip().unwrap();

        assert!(record.skipped);
        assert!(!record.correct);
        assert!(session.is_complete());
    }

    #[test]
    fn test_stats_accuracy_counts_skips_as_misses() {
        let mut session = session_with(vec![
            true_false(true),
            true_false(true),
            true_false(true),
            true_false(true),
        ]);
        session.submit(UserAnswer::Bool(true)).unwrap();
        session.submit(UserAnswer::Bool(true)).unwrap();
        session.submit(UserAnswer::Bool(false)).unwrap();
        session.skip().unwrap();

        let stats = session.stats();
        assert_eq!(stats.total_questions, 4);
        assert_eq!(stats.correct_answers, 2);
        assert_eq!(stats.skipped_questions, 1);
        assert_eq!(stats.accuracy, 50);
    }

    #[test]
    fn test_pause_blocks_submission_until_resume() {
        let mut session = session_with(vec![true_false(true)]);
        session.pause().unwrap();
        assert!(session.submit(UserAnswer::Bool(true)).is_err());
        assert!(session.pause().is_err());

        session.resume().unwrap();
        assert!(session.submit(UserAnswer::Bool(true)).is_ok());
    }

    #[test]
    fn test_resume_only_valid_from_paused() {
        let mut session = session_with(vec![true_false(true)]);
        assert!(session.resume().is_err());
    }

    #[test]
    fn test_percentage_rounds_to_nearest() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(6, 10), 60);
    }

    fn service_fixture() -> (tempfile::TempDir, StudyService, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path(), None).expect("open store");
        (dir, StudyService::new(store.clone()), store)
    }

    #[test]
    fn test_start_with_empty_pool_fails() {
        let (_dir, service, _store) = service_fixture();
        let ctx = SessionContext::for_user("alice");
        let err = service.start(&ctx, StudyConfig::default()).unwrap_err();
        assert!(err.to_string().contains("no questions"));
    }

    #[test]
    fn test_start_draws_at_most_question_count() {
        let (_dir, service, store) = service_fixture();
        let ctx = SessionContext::for_user("alice");
        let repo = QuestionRepo::new(store);
        let pool: Vec<Question> = (0..8).map(|_| true_false(true)).collect();
        repo.bulk_append(&ctx, &pool).unwrap();

        let config = StudyConfig {
            question_count: 5,
            ..StudyConfig::default()
        };
        let session = service.start(&ctx, config).unwrap();
        assert_eq!(session.total_questions(), 5);
    }

    #[test]
    fn test_start_uses_whole_pool_when_smaller_than_request() {
        let (_dir, service, store) = service_fixture();
        let ctx = SessionContext::for_user("alice");
        let repo = QuestionRepo::new(store);
        repo.bulk_append(&ctx, &[true_false(true), true_false(false), true_false(true)])
            .unwrap();

        let config = StudyConfig {
            question_count: 5,
            ..StudyConfig::default()
        };
        let session = service.start(&ctx, config).unwrap();
        assert_eq!(session.total_questions(), 3);
    }

    #[test]
    fn test_finish_rolls_up_user_stats() {
        let (_dir, service, store) = service_fixture();
        let users = UserRepo::new(store.clone());
        let questions = QuestionRepo::new(store);
        let user = User::new("Ada", "ada@example.com", "secret1");
        users.upsert(&user).unwrap();
        let ctx = SessionContext::for_user(user.id.clone());

        let pool: Vec<Question> = (0..10).map(|_| true_false(true)).collect();
        questions.bulk_append(&ctx, &pool).unwrap();

        let config = StudyConfig {
            question_count: 10,
            ..StudyConfig::default()
        };
        let mut session = service.start(&ctx, config).unwrap();
        for i in 0..10 {
            let answer = UserAnswer::Bool(i < 6);
            service.submit_answer(&ctx, &mut session, answer).unwrap();
        }
        let record = service.finish(&ctx, session, EndReason::Completed).unwrap();
        assert_eq!(record.stats.accuracy, 60);

        let updated = users.get_by_id(&user.id).unwrap().unwrap();
        assert_eq!(updated.stats.questions_answered, 10);
        assert_eq!(updated.stats.correct_answers, 6);
        assert_eq!(updated.stats.accuracy, 60);
        assert_eq!(updated.stats.study_sessions, 1);
    }

    #[test]
    fn test_answered_questions_feed_review_mode() {
        let (_dir, service, store) = service_fixture();
        let ctx = SessionContext::for_user("alice");
        let repo = QuestionRepo::new(store);
        repo.bulk_append(&ctx, &[true_false(true), true_false(true)])
            .unwrap();

        let config = StudyConfig {
            question_count: 2,
            ..StudyConfig::default()
        };
        let mut session = service.start(&ctx, config).unwrap();
        // One right, one wrong.
        service
            .submit_answer(&ctx, &mut session, UserAnswer::Bool(true))
            .unwrap();
        service
            .submit_answer(&ctx, &mut session, UserAnswer::Bool(false))
            .unwrap();
        service.finish(&ctx, session, EndReason::Completed).unwrap();

        let review = StudyConfig {
            mode: StudyMode::Review,
            question_count: 10,
            ..StudyConfig::default()
        };
        let session = service.start(&ctx, review).unwrap();
        assert_eq!(session.total_questions(), 1);
    }
}
