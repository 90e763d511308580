//! Answer capture.
//!
//! [`record_answer`] and [`clear_answer`] are the store operations.
//! [`AnswerWriter`] sits in front of them for an interactive session: every
//! selection is applied locally at once and persisted in the background, with
//! writes for the same question serialized so the latest selection always wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::error::{Result, TryoutError};
use crate::model::{AnswerChoice, Question, TryoutSession, UserAnswer};
use crate::repo::repo;
use crate::traits::{EntityStore, Query};

fn answer_key(session_id: &str, question_id: &str) -> Query {
    Query::new()
        .eq("session_id", session_id)
        .eq("question_id", question_id)
}

/// Create or update the answer row for (`session`, `question`) in one upsert.
///
/// Only the status of the `session` passed in is checked; the stored record is
/// not re-read. Callers must hold a current copy. [`crate::session::ActiveTryout`]
/// guarantees this through its phase guard.
pub async fn record_answer(
    store: &dyn EntityStore,
    session: &TryoutSession,
    question: &Question,
    choice: AnswerChoice,
    elapsed_seconds: u64,
) -> Result<UserAnswer> {
    if session.is_completed() {
        return Err(TryoutError::SessionClosed(session.id.clone()));
    }
    let fields = json!({
        "user_answer": choice,
        "is_correct": question.is_correct(choice),
        "time_spent_seconds": elapsed_seconds,
    });
    repo::<UserAnswer>(store)
        .upsert(&answer_key(&session.id, &question.id), &fields)
        .await
}

/// Remove the answer row for (`session`, `question`), if there is one.
///
/// Checks the given `session` copy only, like [`record_answer`].
pub async fn clear_answer(
    store: &dyn EntityStore,
    session: &TryoutSession,
    question: &Question,
) -> Result<()> {
    if session.is_completed() {
        return Err(TryoutError::SessionClosed(session.id.clone()));
    }
    let answers = repo::<UserAnswer>(store);
    let existing = answers
        .filter(&answer_key(&session.id, &question.id))
        .await?;
    for row in existing {
        answers.delete(&row.id).await?;
    }
    Ok(())
}

/// A selection for one question, tagged with its submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selection {
    choice: Option<AnswerChoice>,
    elapsed_seconds: u64,
    seq: u64,
}

/// Shared between the writer and its background tasks.
#[derive(Default)]
struct Ledger {
    /// What the user currently sees as selected.
    desired: HashMap<String, Selection>,
    /// Last selection confirmed by the store.
    persisted: HashMap<String, Selection>,
}

struct WriteReport {
    question_id: String,
    seq: u64,
    result: Result<()>,
}

/// A background write that did not reach the store.
#[derive(Debug)]
pub struct FailedWrite {
    pub question_id: String,
    pub error: TryoutError,
}

/// Result of waiting for every outstanding write.
#[derive(Debug, Default)]
pub struct SettleReport {
    pub completed: usize,
    /// Writes whose selection was reverted to the last persisted value.
    pub failed: Vec<FailedWrite>,
}

/// Tracks the selections of one session and their background persistence.
pub struct AnswerWriter {
    store: Arc<dyn EntityStore>,
    session: TryoutSession,
    ledger: Arc<Mutex<Ledger>>,
    locks: HashMap<String, Arc<tokio::sync::Mutex<()>>>,
    tasks: JoinSet<WriteReport>,
    next_seq: u64,
}

impl AnswerWriter {
    pub fn new(store: Arc<dyn EntityStore>, session: TryoutSession) -> Self {
        Self {
            store,
            session,
            ledger: Arc::new(Mutex::new(Ledger::default())),
            locks: HashMap::new(),
            tasks: JoinSet::new(),
            next_seq: 0,
        }
    }

    /// Current local selection for a question.
    pub fn selection(&self, question_id: &str) -> Option<AnswerChoice> {
        let ledger = self.ledger.lock().unwrap();
        ledger.desired.get(question_id).and_then(|s| s.choice)
    }

    /// Number of questions with a local selection.
    pub fn selected_count(&self) -> usize {
        let ledger = self.ledger.lock().unwrap();
        ledger.desired.values().filter(|s| s.choice.is_some()).count()
    }

    /// Number of writes not yet awaited by [`AnswerWriter::settle`].
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Select `choice` (or clear with `None`) and persist it in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self, question: &Question, choice: Option<AnswerChoice>, elapsed_seconds: u64) {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.ledger.lock().unwrap().desired.insert(
            question.id.clone(),
            Selection {
                choice,
                elapsed_seconds,
                seq,
            },
        );

        let lock = self.locks.entry(question.id.clone()).or_default().clone();
        let store = self.store.clone();
        let session = self.session.clone();
        let ledger = self.ledger.clone();
        let question = question.clone();

        self.tasks.spawn(async move {
            let _guard = lock.lock().await;
            let (latest, persisted_seq) = {
                let ledger = ledger.lock().unwrap();
                (
                    ledger.desired.get(&question.id).copied(),
                    ledger.persisted.get(&question.id).map_or(0, |s| s.seq),
                )
            };
            // An earlier task already wrote this (or a newer) selection.
            let Some(latest) = latest.filter(|s| s.seq > persisted_seq) else {
                return WriteReport {
                    question_id: question.id,
                    seq,
                    result: Ok(()),
                };
            };

            let result = match latest.choice {
                Some(choice) => record_answer(
                    store.as_ref(),
                    &session,
                    &question,
                    choice,
                    latest.elapsed_seconds,
                )
                .await
                .map(|_| ()),
                None => clear_answer(store.as_ref(), &session, &question).await,
            };
            if result.is_ok() {
                debug!(question = %question.id, seq = latest.seq, "answer persisted");
                ledger
                    .lock()
                    .unwrap()
                    .persisted
                    .insert(question.id.clone(), latest);
            }
            WriteReport {
                question_id: question.id,
                seq: latest.seq,
                result,
            }
        });
    }

    /// Wait for every outstanding write.
    ///
    /// A question whose latest selection failed to persist is reverted to the
    /// last value the store accepted.
    pub async fn settle(&mut self) -> SettleReport {
        let mut report = SettleReport::default();
        let mut failures: Vec<WriteReport> = Vec::new();

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(write) if write.result.is_ok() => report.completed += 1,
                Ok(write) => failures.push(write),
                Err(e) => error!("answer write task failed: {e}"),
            }
        }

        let mut ledger = self.ledger.lock().unwrap();
        for write in failures {
            let persisted = ledger.persisted.get(&write.question_id).copied();
            if persisted.is_some_and(|p| p.seq >= write.seq) {
                // A retry of the same selection got through.
                report.completed += 1;
                continue;
            }
            let Err(error) = write.result else { continue };
            warn!(question = %write.question_id, "answer write failed, reverting: {error}");

            let is_latest = ledger
                .desired
                .get(&write.question_id)
                .is_some_and(|d| d.seq == write.seq);
            if is_latest {
                match persisted {
                    Some(p) => {
                        ledger.desired.insert(write.question_id.clone(), p);
                    }
                    None => {
                        ledger.desired.remove(&write.question_id);
                    }
                }
            }
            report.failed.push(FailedWrite {
                question_id: write.question_id,
                error,
            });
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::model::SessionStatus;
    use crate::traits::Collection;
    use chrono::Utc;
    use std::time::Duration;

    fn question(id: &str, correct: AnswerChoice) -> Question {
        Question {
            id: id.into(),
            package_id: "pkg".into(),
            question_number: 1,
            question_text: "?".into(),
            option_a: "a".into(),
            option_b: "b".into(),
            option_c: "c".into(),
            option_d: "d".into(),
            option_e: "e".into(),
            correct_answer: correct,
            explanation: String::new(),
            main_category: None,
            sub_category: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn session(status: SessionStatus) -> TryoutSession {
        TryoutSession {
            id: "s1".into(),
            user_id: "u1".into(),
            package_id: "pkg".into(),
            start_time: Utc::now(),
            end_time: None,
            status,
            total_score: None,
            correct_answers: None,
            wrong_answers: None,
            unanswered: None,
            created_at: None,
            updated_at: None,
        }
    }

    async fn rows(store: &InMemoryStore) -> Vec<UserAnswer> {
        repo::<UserAnswer>(store)
            .filter(&Query::new().eq("session_id", "s1"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn recording_twice_leaves_one_row() {
        let store = InMemoryStore::new();
        let s = session(SessionStatus::InProgress);
        let q = question("q1", AnswerChoice::C);

        record_answer(&store, &s, &q, AnswerChoice::A, 4).await.unwrap();
        let second = record_answer(&store, &s, &q, AnswerChoice::C, 9).await.unwrap();
        assert!(second.is_correct);

        let rows = rows(&store).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_answer, Some(AnswerChoice::C));
        assert_eq!(rows[0].time_spent_seconds, 9);
    }

    #[tokio::test]
    async fn completed_session_rejects_writes() {
        let store = InMemoryStore::new();
        let s = session(SessionStatus::Completed);
        let q = question("q1", AnswerChoice::C);
        let err = record_answer(&store, &s, &q, AnswerChoice::A, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, TryoutError::SessionClosed(_)));
        assert_eq!(store.count(Collection::UserAnswer), 0);
    }

    #[tokio::test]
    async fn completed_session_keeps_its_rows_on_clear() {
        let store = InMemoryStore::new();
        let q = question("q1", AnswerChoice::C);
        record_answer(&store, &session(SessionStatus::InProgress), &q, AnswerChoice::A, 1)
            .await
            .unwrap();

        let err = clear_answer(&store, &session(SessionStatus::Completed), &q)
            .await
            .unwrap_err();
        assert!(matches!(err, TryoutError::SessionClosed(_)));
        assert_eq!(rows(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn clear_removes_row() {
        let store = InMemoryStore::new();
        let s = session(SessionStatus::InProgress);
        let q = question("q1", AnswerChoice::C);
        record_answer(&store, &s, &q, AnswerChoice::A, 1).await.unwrap();
        clear_answer(&store, &s, &q).await.unwrap();
        assert!(rows(&store).await.is_empty());
        // Clearing again is fine.
        clear_answer(&store, &s, &q).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_reselection_persists_latest() {
        let store = Arc::new(InMemoryStore::new().with_write_delay(Duration::from_millis(300)));
        let mut writer = AnswerWriter::new(store.clone(), session(SessionStatus::InProgress));
        let q = question("q1", AnswerChoice::B);

        writer.submit(&q, Some(AnswerChoice::A), 1);
        writer.submit(&q, Some(AnswerChoice::D), 2);
        writer.submit(&q, Some(AnswerChoice::B), 3);
        assert_eq!(writer.selection("q1"), Some(AnswerChoice::B));

        let report = writer.settle().await;
        assert!(report.failed.is_empty());
        assert_eq!(writer.pending(), 0);

        let rows = rows(&store).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_answer, Some(AnswerChoice::B));
        assert!(rows[0].is_correct);
        assert_eq!(rows[0].time_spent_seconds, 3);
    }

    #[tokio::test]
    async fn clearing_through_writer_deletes_row() {
        let store = Arc::new(InMemoryStore::new());
        let mut writer = AnswerWriter::new(store.clone(), session(SessionStatus::InProgress));
        let q = question("q1", AnswerChoice::B);

        writer.submit(&q, Some(AnswerChoice::A), 1);
        writer.settle().await;
        writer.submit(&q, None, 2);
        writer.settle().await;

        assert_eq!(writer.selection("q1"), None);
        assert_eq!(writer.selected_count(), 0);
        assert!(rows(&store).await.is_empty());
    }

    #[tokio::test]
    async fn failed_write_reverts_selection() {
        let store = Arc::new(InMemoryStore::new());
        let mut writer = AnswerWriter::new(store.clone(), session(SessionStatus::InProgress));
        let q = question("q1", AnswerChoice::B);

        writer.submit(&q, Some(AnswerChoice::A), 1);
        writer.settle().await;

        store.fail_writes_to(Collection::UserAnswer);
        writer.submit(&q, Some(AnswerChoice::E), 2);
        let report = writer.settle().await;

        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.is_remote());
        assert_eq!(writer.selection("q1"), Some(AnswerChoice::A));
        assert_eq!(rows(&store).await[0].user_answer, Some(AnswerChoice::A));
    }

    #[tokio::test]
    async fn failed_first_write_clears_selection() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_writes_to(Collection::UserAnswer);
        let mut writer = AnswerWriter::new(store.clone(), session(SessionStatus::InProgress));
        let q = question("q1", AnswerChoice::B);

        writer.submit(&q, Some(AnswerChoice::C), 1);
        let report = writer.settle().await;
        assert_eq!(report.failed.len(), 1);
        assert_eq!(writer.selection("q1"), None);
    }
}
