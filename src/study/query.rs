//! Question selection for study sessions.
//!
//! One parameterized query covers every study mode: an optional difficulty
//! filter plus a mode predicate over each question's answer state. The
//! matching pool is shuffled and truncated to the requested count; a pool
//! smaller than the request yields the whole pool, never an error.

use rand::prelude::SliceRandom;
use rand::Rng;

use crate::model::{Difficulty, Question, StudyMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionQuery {
    pub difficulty: Option<Difficulty>,
    pub mode: StudyMode,
}

impl QuestionQuery {
    pub fn new(mode: StudyMode, difficulty: Option<Difficulty>) -> Self {
        Self { difficulty, mode }
    }

    /// Whether `question` belongs in this query's pool.
    pub fn matches(&self, question: &Question) -> bool {
        if let Some(difficulty) = self.difficulty {
            if question.difficulty != difficulty {
                return false;
            }
        }
        match self.mode {
            // Practice mixes answered and unanswered.
            StudyMode::Practice => true,
            StudyMode::Exam => !question.state.answered,
            StudyMode::Review => {
                question.state.answered && question.state.correct != Some(true)
            }
        }
    }

    /// Filter, shuffle, and truncate the pool to at most `count` questions.
    pub fn select<R: Rng + ?Sized>(
        &self,
        pool: &[Question],
        count: usize,
        rng: &mut R,
    ) -> Vec<Question> {
        let mut matching: Vec<Question> =
            pool.iter().filter(|q| self.matches(q)).cloned().collect();
        matching.shuffle(rng);
        matching.truncate(count);
        matching
    }
}
