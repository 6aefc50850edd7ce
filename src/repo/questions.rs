//! Per-user question collection.

use tracing::warn;

use crate::errors::Result;
use crate::model::Question;
use crate::store::keys::{Collection, SessionContext};
use crate::store::Store;

/// Repository for the active user's generated questions.
#[derive(Debug, Clone)]
pub struct QuestionRepo {
    store: Store,
}

impl QuestionRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn key(ctx: &SessionContext) -> Option<String> {
        ctx.collection_key(Collection::Questions)
    }

    /// All questions for the context's user; empty when anonymous.
    pub fn get_all(&self, ctx: &SessionContext) -> Result<Vec<Question>> {
        match Self::key(ctx) {
            Some(key) => Ok(self.store.get(&key)?.unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    pub fn get_by_id(&self, ctx: &SessionContext, id: &str) -> Result<Option<Question>> {
        Ok(self.get_all(ctx)?.into_iter().find(|q| q.id == id))
    }

    /// Insert or replace one question by id.
    ///
    /// Returns `Ok(false)` when nothing was persisted because no user is
    /// active; that is not an error.
    pub fn upsert(&self, ctx: &SessionContext, question: &Question) -> Result<bool> {
        let Some(key) = Self::key(ctx) else {
            warn!("no active user, question not persisted");
            return Ok(false);
        };
        let mut questions: Vec<Question> = self.store.get(&key)?.unwrap_or_default();
        match questions.iter_mut().find(|q| q.id == question.id) {
            Some(slot) => *slot = question.clone(),
            None => questions.push(question.clone()),
        }
        self.store.set(&key, &questions)?;
        Ok(true)
    }

    /// Append a batch of questions in one write.
    pub fn bulk_append(&self, ctx: &SessionContext, batch: &[Question]) -> Result<bool> {
        let Some(key) = Self::key(ctx) else {
            warn!("no active user, question batch not persisted");
            return Ok(false);
        };
        let mut questions: Vec<Question> = self.store.get(&key)?.unwrap_or_default();
        questions.extend_from_slice(batch);
        self.store.set(&key, &questions)?;
        Ok(true)
    }

    /// Delete a question by id. `Ok(false)` when absent or anonymous.
    pub fn delete(&self, ctx: &SessionContext, id: &str) -> Result<bool> {
        let Some(key) = Self::key(ctx) else {
            return Ok(false);
        };
        let mut questions: Vec<Question> = self.store.get(&key)?.unwrap_or_default();
        let before = questions.len();
        questions.retain(|q| q.id != id);
        if questions.len() == before {
            return Ok(false);
        }
        self.store.set(&key, &questions)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, QuestionBody};

    fn temp_repo() -> (tempfile::TempDir, QuestionRepo) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path(), None).expect("open store");
        (dir, QuestionRepo::new(store))
    }

    fn sample() -> Question {
        Question::new(
            "Is water wet?",
            QuestionBody::TrueFalse { answer: true },
            Difficulty::Easy,
            "pasted text",
        )
    }

    #[test]
    fn test_anonymous_write_is_dropped_not_an_error() {
        let (_dir, repo) = temp_repo();
        let ctx = SessionContext::anonymous();
        assert!(!repo.upsert(&ctx, &sample()).unwrap());
        assert!(repo.get_all(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_questions_are_partitioned_by_user() {
        let (_dir, repo) = temp_repo();
        let alice = SessionContext::for_user("alice");
        let bob = SessionContext::for_user("bob");

        assert!(repo.upsert(&alice, &sample()).unwrap());
        assert_eq!(repo.get_all(&alice).unwrap().len(), 1);
        assert!(repo.get_all(&bob).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let (_dir, repo) = temp_repo();
        let ctx = SessionContext::for_user("alice");
        let mut q = sample();
        repo.upsert(&ctx, &q).unwrap();

        q.state.answered = true;
        q.state.correct = Some(true);
        repo.upsert(&ctx, &q).unwrap();

        let all = repo.get_all(&ctx).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].state.answered);
    }

    #[test]
    fn test_bulk_append_keeps_existing() {
        let (_dir, repo) = temp_repo();
        let ctx = SessionContext::for_user("alice");
        repo.upsert(&ctx, &sample()).unwrap();
        repo.bulk_append(&ctx, &[sample(), sample()]).unwrap();
        assert_eq!(repo.get_all(&ctx).unwrap().len(), 3);
    }

    #[test]
    fn test_delete_reports_whether_found() {
        let (_dir, repo) = temp_repo();
        let ctx = SessionContext::for_user("alice");
        let q = sample();
        repo.upsert(&ctx, &q).unwrap();

        assert!(repo.delete(&ctx, &q.id).unwrap());
        assert!(!repo.delete(&ctx, &q.id).unwrap());
    }
}
