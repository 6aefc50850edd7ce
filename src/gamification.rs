//! Points, streaks, levels, and achievements.
//!
//! Gamification state lives in its own per-user collection and is updated
//! as a side channel of study activity: answers feed streaks and points,
//! logins feed the daily streak, finished sessions can unlock the
//! perfect-score achievement. Each achievement unlocks once and awards a
//! one-time point bonus.

use chrono::{Duration, Local, NaiveDate};
use tracing::{debug, info};

use crate::errors::Result;
use crate::model::{Difficulty, GamificationStats, SessionStats};
use crate::store::keys::{Collection, SessionContext};
use crate::store::Store;

/// Seconds answered under which a time bonus applies; the bonus shrinks by
/// one point per elapsed second.
const TIME_BONUS_WINDOW_SECS: u64 = 30;

/// Points per level: level = points / 100 + 1.
const POINTS_PER_LEVEL: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub points: u64,
}

pub const ACHIEVEMENTS: [Achievement; 6] = [
    Achievement {
        id: "first_question",
        name: "First Steps",
        description: "Answer your first question",
        points: 10,
    },
    Achievement {
        id: "streak_3",
        name: "On a Roll",
        description: "Answer 3 questions correctly in a row",
        points: 25,
    },
    Achievement {
        id: "streak_7",
        name: "Unstoppable",
        description: "Answer 7 questions correctly in a row",
        points: 50,
    },
    Achievement {
        id: "daily_streak_7",
        name: "Week of Dedication",
        description: "Study 7 days in a row",
        points: 75,
    },
    Achievement {
        id: "questions_50",
        name: "Half Century",
        description: "Answer 50 questions",
        points: 100,
    },
    Achievement {
        id: "perfect_score",
        name: "Perfectionist",
        description: "Finish a session of 10+ questions with 100% accuracy",
        points: 150,
    },
];

pub fn achievement_by_id(id: &str) -> Option<&'static Achievement> {
    ACHIEVEMENTS.iter().find(|a| a.id == id)
}

fn base_points(difficulty: Difficulty) -> u64 {
    match difficulty {
        Difficulty::Easy => 10,
        Difficulty::Medium => 20,
        Difficulty::Hard => 30,
    }
}

#[derive(Debug, Clone)]
pub struct GamificationService {
    store: Store,
}

impl GamificationService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn stats(&self, ctx: &SessionContext) -> Result<GamificationStats> {
        match ctx.collection_key(Collection::Gamification) {
            Some(key) => Ok(self.store.get(&key)?.unwrap_or_default()),
            None => Ok(GamificationStats::default()),
        }
    }

    fn save(&self, ctx: &SessionContext, stats: &GamificationStats) -> Result<bool> {
        match ctx.collection_key(Collection::Gamification) {
            Some(key) => {
                self.store.set(&key, stats)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Record one answered question: streaks, points (difficulty base plus
    /// a speed bonus), level, and any newly unlocked achievements.
    ///
    /// Returns the achievements unlocked by this answer.
    pub fn record_answer(
        &self,
        ctx: &SessionContext,
        correct: bool,
        difficulty: Difficulty,
        seconds_taken: u64,
    ) -> Result<Vec<&'static Achievement>> {
        let mut stats = self.stats(ctx)?;
        stats.total_questions += 1;

        if correct {
            stats.correct_answers += 1;
            stats.current_streak += 1;
            stats.best_streak = stats.best_streak.max(stats.current_streak);
            let bonus = TIME_BONUS_WINDOW_SECS.saturating_sub(seconds_taken);
            stats.total_points += base_points(difficulty) + bonus;
        } else {
            stats.current_streak = 0;
        }

        let first_question = stats.total_questions >= 1;
        let streak_3 = stats.current_streak >= 3;
        let streak_7 = stats.current_streak >= 7;
        let questions_50 = stats.total_questions >= 50;

        let mut unlocked = Vec::new();
        self.check(&mut stats, "first_question", first_question, &mut unlocked);
        self.check(&mut stats, "streak_3", streak_3, &mut unlocked);
        self.check(&mut stats, "streak_7", streak_7, &mut unlocked);
        self.check(&mut stats, "questions_50", questions_50, &mut unlocked);

        stats.level = stats.total_points / POINTS_PER_LEVEL + 1;
        self.save(ctx, &stats)?;
        debug!(
            points = stats.total_points,
            streak = stats.current_streak,
            "recorded answer"
        );
        Ok(unlocked)
    }

    /// Record activity for today: extends the daily streak when yesterday
    /// was also active, otherwise restarts it at one.
    pub fn record_daily_activity(&self, ctx: &SessionContext) -> Result<Vec<&'static Achievement>> {
        self.record_daily_activity_on(ctx, Local::now().date_naive())
    }

    fn record_daily_activity_on(
        &self,
        ctx: &SessionContext,
        today: NaiveDate,
    ) -> Result<Vec<&'static Achievement>> {
        let mut stats = self.stats(ctx)?;
        if stats.last_active_date == Some(today) {
            return Ok(Vec::new());
        }

        let yesterday = today - Duration::days(1);
        stats.daily_streak = if stats.last_active_date == Some(yesterday) {
            stats.daily_streak + 1
        } else {
            1
        };
        stats.last_active_date = Some(today);

        let daily_streak_7 = stats.daily_streak >= 7;
        let mut unlocked = Vec::new();
        self.check(&mut stats, "daily_streak_7", daily_streak_7, &mut unlocked);
        stats.level = stats.total_points / POINTS_PER_LEVEL + 1;
        self.save(ctx, &stats)?;
        Ok(unlocked)
    }

    /// Check a finished session for the perfect-score achievement.
    pub fn record_session(
        &self,
        ctx: &SessionContext,
        session: &SessionStats,
    ) -> Result<Vec<&'static Achievement>> {
        let mut stats = self.stats(ctx)?;
        let perfect = session.total_questions >= 10
            && session.correct_answers == session.total_questions;

        let mut unlocked = Vec::new();
        self.check(&mut stats, "perfect_score", perfect, &mut unlocked);
        if !unlocked.is_empty() {
            stats.level = stats.total_points / POINTS_PER_LEVEL + 1;
            self.save(ctx, &stats)?;
        }
        Ok(unlocked)
    }

    fn check(
        &self,
        stats: &mut GamificationStats,
        id: &'static str,
        condition: bool,
        unlocked: &mut Vec<&'static Achievement>,
    ) {
        if !condition || stats.achievements.iter().any(|a| a == id) {
            return;
        }
        if let Some(achievement) = achievement_by_id(id) {
            stats.achievements.push(id.to_string());
            stats.total_points += achievement.points;
            info!(achievement = id, "achievement unlocked");
            unlocked.push(achievement);
        }
    }
}
