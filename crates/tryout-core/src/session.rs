//! Timed tryout sessions.
//!
//! [`start_session`] creates the session record and returns an
//! [`ActiveTryout`], which owns the countdown, the per-question timer and the
//! background answer writes until the session is finished.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::answers::{AnswerWriter, SettleReport};
use crate::countdown::{Countdown, QuestionTimer, RevisitPolicy, Tick};
use crate::error::{Result, TryoutError};
use crate::model::{
    percent, AnswerChoice, Question, QuestionPackage, QuestionTagStats, SessionStatus,
    TryoutSession, User, UserAnswer,
};
use crate::payment::user_has_access;
use crate::repo::repo;
use crate::scoring::{compute_results, SessionResults, TagStatsDraft};
use crate::traits::{EntityStore, OrderSpec, Query};

/// Tunables for running a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub revisit_policy: RevisitPolicy,
    /// Pause between the countdown reaching zero and the forced finish.
    #[serde(default = "default_grace_ms")]
    pub expiry_grace_ms: u64,
    /// Maximum number of questions loaded for a package.
    #[serde(default = "default_question_limit")]
    pub question_limit: usize,
}

fn default_grace_ms() -> u64 {
    2000
}

fn default_question_limit() -> usize {
    200
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            revisit_policy: RevisitPolicy::default(),
            expiry_grace_ms: default_grace_ms(),
            question_limit: default_question_limit(),
        }
    }
}

impl SessionConfig {
    pub fn expiry_grace(&self) -> Duration {
        Duration::from_millis(self.expiry_grace_ms)
    }
}

/// How a finish was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishMode {
    /// The user confirmed "finish".
    Manual,
    /// The countdown ran out.
    Forced,
}

/// Where an [`ActiveTryout`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    InProgress,
    Finishing,
    Completed,
}

/// A session that has just been completed.
#[derive(Debug, Clone)]
pub struct CompletedSession {
    pub session: TryoutSession,
    pub results: SessionResults,
    pub mode: FinishMode,
    pub tag_stats_written: usize,
    /// Tag-stat rows that could not be written. They are logged, not rolled back.
    pub tag_stats_failed: usize,
    /// Answer writes that never reached the store.
    pub failed_answer_writes: usize,
}

#[derive(Debug, Clone)]
pub enum FinishOutcome {
    Completed(Box<CompletedSession>),
    /// The session was already completed; nothing was written.
    AlreadyFinished,
}

/// Result of one countdown tick.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Seconds remaining.
    Running(u64),
    /// Time ran out and the session was force-finished.
    TimedOut(FinishOutcome),
    /// The countdown is not running.
    Stopped,
}

/// Start a new session of `package_id` for `user`.
#[instrument(skip(store, user, config), fields(user = %user.id))]
pub async fn start_session(
    store: Arc<dyn EntityStore>,
    user: &User,
    package_id: &str,
    config: SessionConfig,
) -> Result<ActiveTryout> {
    let package = repo::<QuestionPackage>(store.as_ref())
        .get(package_id)
        .await?;
    if package.duration_minutes == 0 {
        return Err(TryoutError::Validation(format!(
            "package '{}' has no time budget",
            package.title
        )));
    }

    let questions = repo::<Question>(store.as_ref())
        .filter(
            &Query::new()
                .eq("package_id", package_id)
                .order_by(OrderSpec::asc("question_number"))
                .limit(config.question_limit),
        )
        .await?;
    if questions.is_empty() {
        return Err(TryoutError::Validation(format!(
            "package '{}' has no questions",
            package.title
        )));
    }

    if !user_has_access(store.as_ref(), user, &package).await? {
        return Err(TryoutError::PaymentRequired(package.id.clone()));
    }

    let session = repo::<TryoutSession>(store.as_ref())
        .create(&json!({
            "user_id": user.id,
            "package_id": package.id,
            "start_time": Utc::now(),
            "status": SessionStatus::InProgress,
        }))
        .await?;
    info!(
        session = %session.id,
        package = %package.id,
        questions = questions.len(),
        minutes = package.duration_minutes,
        "tryout started"
    );

    Ok(ActiveTryout::new(store, package, questions, session, config))
}

/// A session in progress.
pub struct ActiveTryout {
    store: Arc<dyn EntityStore>,
    package: QuestionPackage,
    questions: Vec<Question>,
    session: TryoutSession,
    config: SessionConfig,
    countdown: Countdown,
    timer: QuestionTimer,
    writer: AnswerWriter,
    current: usize,
    phase: Phase,
}

impl ActiveTryout {
    fn new(
        store: Arc<dyn EntityStore>,
        package: QuestionPackage,
        questions: Vec<Question>,
        session: TryoutSession,
        config: SessionConfig,
    ) -> Self {
        let mut countdown = Countdown::new();
        countdown.start(package.budget_secs());
        let mut timer = QuestionTimer::new(config.revisit_policy);
        timer.display(0, Instant::now());
        let writer = AnswerWriter::new(store.clone(), session.clone());
        Self {
            store,
            package,
            questions,
            session,
            config,
            countdown,
            timer,
            writer,
            current: 0,
            phase: Phase::InProgress,
        }
    }

    pub fn package(&self) -> &QuestionPackage {
        &self.package
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn session(&self) -> &TryoutSession {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining_secs(&self) -> u64 {
        self.countdown.remaining_secs()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> &Question {
        &self.questions[self.current]
    }

    // -- navigation ---------------------------------------------------------

    /// Display question `index`, clamped to the question list.
    pub fn goto(&mut self, index: usize) -> usize {
        self.current = index.min(self.questions.len() - 1);
        self.timer.display(self.current, Instant::now());
        self.current
    }

    pub fn next(&mut self) -> usize {
        self.goto(self.current.saturating_add(1))
    }

    pub fn previous(&mut self) -> usize {
        self.goto(self.current.saturating_sub(1))
    }

    // -- answers ------------------------------------------------------------

    /// Local selection for question `index`.
    pub fn selection(&self, index: usize) -> Option<AnswerChoice> {
        self.questions
            .get(index)
            .and_then(|q| self.writer.selection(&q.id))
    }

    pub fn answered_count(&self) -> usize {
        self.writer.selected_count()
    }

    pub fn progress_percent(&self) -> u32 {
        percent(self.answered_count() as u32, self.questions.len() as u32)
    }

    /// Select `choice` for the displayed question. Persisted in the background.
    pub fn select_answer(&mut self, choice: AnswerChoice) -> Result<()> {
        self.submit(Some(choice))
    }

    /// Clear the selection of the displayed question.
    pub fn clear_answer(&mut self) -> Result<()> {
        self.submit(None)
    }

    fn submit(&mut self, choice: Option<AnswerChoice>) -> Result<()> {
        if self.phase != Phase::InProgress {
            return Err(TryoutError::SessionClosed(self.session.id.clone()));
        }
        let elapsed = self.timer.elapsed_secs(Instant::now());
        let question = &self.questions[self.current];
        self.writer.submit(question, choice, elapsed);
        Ok(())
    }

    /// Wait for outstanding answer writes.
    pub async fn settle(&mut self) -> SettleReport {
        self.writer.settle().await
    }

    // -- countdown ----------------------------------------------------------

    /// Advance the countdown by one second, force-finishing on expiry.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        if self.phase != Phase::InProgress {
            return Ok(TickOutcome::Stopped);
        }
        match self.countdown.tick() {
            Tick::Running(remaining) => Ok(TickOutcome::Running(remaining)),
            Tick::Expired => {
                info!(session = %self.session.id, "time is up");
                tokio::time::sleep(self.config.expiry_grace()).await;
                let outcome = self.finish(FinishMode::Forced).await?;
                Ok(TickOutcome::TimedOut(outcome))
            }
            Tick::Inactive => Ok(TickOutcome::Stopped),
        }
    }

    // -- completion ---------------------------------------------------------

    /// Complete the session: score it, write tag stats and close the record.
    ///
    /// Runs at most once. If closing the session record fails the tryout
    /// returns to `InProgress` so the finish can be retried.
    pub async fn finish(&mut self, mode: FinishMode) -> Result<FinishOutcome> {
        if self.phase != Phase::InProgress {
            return Ok(FinishOutcome::AlreadyFinished);
        }
        self.phase = Phase::Finishing;
        let countdown = self.countdown.clone();
        self.countdown.cancel();

        match self.complete(mode).await {
            Ok(outcome) => {
                self.phase = Phase::Completed;
                Ok(outcome)
            }
            Err(e) => {
                warn!(session = %self.session.id, "finish failed: {e}");
                self.phase = Phase::InProgress;
                self.countdown = countdown;
                Err(e)
            }
        }
    }

    async fn complete(&mut self, mode: FinishMode) -> Result<FinishOutcome> {
        let settled = self.writer.settle().await;
        let store = self.store.as_ref();
        let sessions = repo::<TryoutSession>(store);

        let stored = sessions.get(&self.session.id).await?;
        if stored.is_completed() {
            info!(session = %stored.id, "session already completed");
            self.session = stored;
            return Ok(FinishOutcome::AlreadyFinished);
        }

        let answers = repo::<UserAnswer>(store)
            .filter(&Query::new().eq("session_id", self.session.id.as_str()))
            .await?;
        let results = compute_results(&self.questions, &answers);

        let (written, failed) = write_tag_stats(store, &self.session, &results.tag_stats).await;

        let session = sessions
            .update(
                &self.session.id,
                &json!({
                    "status": SessionStatus::Completed,
                    "end_time": Utc::now(),
                    "total_score": results.score,
                    "correct_answers": results.correct,
                    "wrong_answers": results.wrong,
                    "unanswered": results.unanswered,
                }),
            )
            .await?;
        info!(
            session = %session.id,
            ?mode,
            score = results.score,
            correct = results.correct,
            wrong = results.wrong,
            unanswered = results.unanswered,
            "tryout completed"
        );
        self.session = session.clone();

        Ok(FinishOutcome::Completed(Box::new(CompletedSession {
            session,
            results,
            mode,
            tag_stats_written: written,
            tag_stats_failed: failed,
            failed_answer_writes: settled.failed.len(),
        })))
    }
}

/// Upsert one stats row per category pair. Returns (written, failed).
async fn write_tag_stats(
    store: &dyn EntityStore,
    session: &TryoutSession,
    drafts: &[TagStatsDraft],
) -> (usize, usize) {
    let stats = repo::<QuestionTagStats>(store);
    let mut written = 0;
    let mut failed = 0;
    for draft in drafts {
        let key = Query::new()
            .eq("session_id", session.id.as_str())
            .eq("main_category", draft.main_category.as_str())
            .eq("sub_category", draft.sub_category.as_str());
        let fields = json!({
            "user_id": session.user_id,
            "package_id": session.package_id,
            "total_questions": draft.total_questions,
            "correct_answers": draft.correct_answers,
            "wrong_answers": draft.wrong_answers,
            "unanswered": draft.unanswered,
            "total_time_seconds": draft.total_time_seconds,
            "average_time_seconds": draft.average_time_seconds,
        });
        match stats.upsert(&key, &fields).await {
            Ok(_) => written += 1,
            Err(e) => {
                warn!(
                    session = %session.id,
                    main = %draft.main_category,
                    sub = %draft.sub_category,
                    "failed to save tag stats: {e}"
                );
                failed += 1;
            }
        }
    }
    (written, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::model::{Payment, PaymentStatus};
    use crate::traits::Collection;

    fn user() -> User {
        User {
            id: "u1".into(),
            full_name: "Andi".into(),
            email: "andi@example.com".into(),
            phone: String::new(),
            is_admin: false,
            subscription_status: None,
        }
    }

    /// Seed a package with `count` questions whose correct answer is A.
    async fn seed(store: &InMemoryStore, count: u32, minutes: u32, requires_payment: bool) -> String {
        let package = repo::<QuestionPackage>(store)
            .create(&json!({
                "title": "SKD Simulation",
                "duration_minutes": minutes,
                "price": 10_000,
                "requires_payment": requires_payment,
            }))
            .await
            .unwrap();
        // Insert in reverse to check ordering by question_number.
        for n in (1..=count).rev() {
            let category = if n % 2 == 0 { "TIU" } else { "TWK" };
            repo::<Question>(store)
                .create(&json!({
                    "package_id": package.id,
                    "question_number": n,
                    "question_text": format!("Question {n}"),
                    "option_a": "a", "option_b": "b", "option_c": "c",
                    "option_d": "d", "option_e": "e",
                    "correct_answer": "A",
                    "main_category": category,
                }))
                .await
                .unwrap();
        }
        package.id
    }

    fn quick_config() -> SessionConfig {
        SessionConfig {
            expiry_grace_ms: 10,
            ..SessionConfig::default()
        }
    }

    fn completed(outcome: FinishOutcome) -> CompletedSession {
        match outcome {
            FinishOutcome::Completed(done) => *done,
            FinishOutcome::AlreadyFinished => panic!("expected a completion"),
        }
    }

    #[tokio::test]
    async fn start_orders_questions_and_starts_clock() {
        let store = Arc::new(InMemoryStore::new());
        let pkg = seed(&store, 3, 2, false).await;
        let tryout = start_session(store.clone(), &user(), &pkg, quick_config())
            .await
            .unwrap();

        let numbers: Vec<u32> = tryout.questions().iter().map(|q| q.question_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(tryout.remaining_secs(), 120);
        assert_eq!(tryout.session().status, SessionStatus::InProgress);
        assert_eq!(store.count(Collection::TryoutSession), 1);
    }

    #[tokio::test]
    async fn start_rejects_bad_packages() {
        let store = Arc::new(InMemoryStore::new());
        let empty = seed(&store, 0, 10, false).await;
        let zero = seed(&store, 2, 0, false).await;

        for pkg in [empty, zero] {
            let err = start_session(store.clone(), &user(), &pkg, quick_config())
                .await
                .err()
                .unwrap();
            assert!(matches!(err, TryoutError::Validation(_)));
        }
        let missing = start_session(store.clone(), &user(), "nope", quick_config())
            .await
            .err()
            .unwrap();
        assert!(matches!(missing, TryoutError::NotFound { .. }));
        assert_eq!(store.count(Collection::TryoutSession), 0);
    }

    #[tokio::test]
    async fn paid_package_requires_completed_payment() {
        let store = Arc::new(InMemoryStore::new());
        let pkg = seed(&store, 2, 10, true).await;
        let err = start_session(store.clone(), &user(), &pkg, quick_config())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TryoutError::PaymentRequired(_)));

        repo::<Payment>(store.as_ref())
            .create(&json!({
                "user_id": "u1",
                "package_id": pkg,
                "amount": 10_000,
                "payment_method": "QRIS",
                "status": PaymentStatus::Completed,
                "expires_at": Utc::now(),
            }))
            .await
            .unwrap();
        assert!(start_session(store.clone(), &user(), &pkg, quick_config())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn manual_finish_scores_and_writes_stats() {
        let store = Arc::new(InMemoryStore::new());
        let pkg = seed(&store, 5, 10, false).await;
        let mut tryout = start_session(store.clone(), &user(), &pkg, quick_config())
            .await
            .unwrap();

        for choice in [AnswerChoice::A, AnswerChoice::A, AnswerChoice::A, AnswerChoice::B] {
            tryout.select_answer(choice).unwrap();
            tryout.next();
        }
        assert_eq!(tryout.answered_count(), 4);
        assert_eq!(tryout.progress_percent(), 80);

        let done = completed(tryout.finish(FinishMode::Manual).await.unwrap());
        assert_eq!(done.results.score, 60);
        assert_eq!(
            (done.results.correct, done.results.wrong, done.results.unanswered),
            (3, 1, 1)
        );
        assert_eq!(done.session.status, SessionStatus::Completed);
        assert!(done.session.end_time.is_some());
        assert_eq!(done.session.question_count(), Some(5));
        assert_eq!(done.tag_stats_written, 2);
        assert_eq!(store.count(Collection::QuestionTagStats), 2);
        assert_eq!(tryout.phase(), Phase::Completed);
    }

    #[tokio::test]
    async fn second_finish_writes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let pkg = seed(&store, 2, 10, false).await;
        let mut tryout = start_session(store.clone(), &user(), &pkg, quick_config())
            .await
            .unwrap();
        tryout.finish(FinishMode::Manual).await.unwrap();
        let writes = store.write_count();

        let again = tryout.finish(FinishMode::Forced).await.unwrap();
        assert!(matches!(again, FinishOutcome::AlreadyFinished));
        assert_eq!(store.write_count(), writes);
        assert!(matches!(
            tryout.select_answer(AnswerChoice::A),
            Err(TryoutError::SessionClosed(_))
        ));
    }

    #[tokio::test]
    async fn session_completed_elsewhere_is_not_rescored() {
        let store = Arc::new(InMemoryStore::new());
        let pkg = seed(&store, 2, 10, false).await;
        let mut tryout = start_session(store.clone(), &user(), &pkg, quick_config())
            .await
            .unwrap();
        repo::<TryoutSession>(store.as_ref())
            .update(&tryout.session().id, &json!({"status": "completed"}))
            .await
            .unwrap();

        let outcome = tryout.finish(FinishMode::Manual).await.unwrap();
        assert!(matches!(outcome, FinishOutcome::AlreadyFinished));
        assert_eq!(store.count(Collection::QuestionTagStats), 0);
        assert_eq!(tryout.phase(), Phase::Completed);
    }

    #[tokio::test]
    async fn failed_close_can_be_retried_without_duplicate_stats() {
        let store = Arc::new(InMemoryStore::new());
        let pkg = seed(&store, 4, 10, false).await;
        let mut tryout = start_session(store.clone(), &user(), &pkg, quick_config())
            .await
            .unwrap();
        tryout.select_answer(AnswerChoice::A).unwrap();

        store.fail_writes_to(Collection::TryoutSession);
        let err = tryout.finish(FinishMode::Manual).await.unwrap_err();
        assert!(err.is_remote());
        assert_eq!(tryout.phase(), Phase::InProgress);
        assert!(tryout.remaining_secs() > 0);
        assert_eq!(store.count(Collection::QuestionTagStats), 2);

        store.restore_writes_to(Collection::TryoutSession);
        let done = completed(tryout.finish(FinishMode::Manual).await.unwrap());
        assert_eq!(done.results.correct, 1);
        assert_eq!(store.count(Collection::QuestionTagStats), 2);
    }

    #[tokio::test]
    async fn tag_stat_failures_are_counted_not_fatal() {
        let store = Arc::new(InMemoryStore::new());
        let pkg = seed(&store, 2, 10, false).await;
        let mut tryout = start_session(store.clone(), &user(), &pkg, quick_config())
            .await
            .unwrap();
        store.fail_writes_to(Collection::QuestionTagStats);

        let done = completed(tryout.finish(FinishMode::Manual).await.unwrap());
        assert_eq!(done.tag_stats_written, 0);
        assert_eq!(done.tag_stats_failed, 2);
        assert!(done.session.is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_forces_single_completion() {
        let store = Arc::new(InMemoryStore::new());
        let pkg = seed(&store, 10, 1, false).await;
        let mut tryout = start_session(store.clone(), &user(), &pkg, quick_config())
            .await
            .unwrap();
        tryout.select_answer(AnswerChoice::A).unwrap();
        tryout.next();
        tryout.select_answer(AnswerChoice::C).unwrap();

        let mut timeouts = Vec::new();
        for _ in 0..75 {
            match tryout.tick().await.unwrap() {
                TickOutcome::Running(_) => {}
                TickOutcome::TimedOut(outcome) => timeouts.push(outcome),
                TickOutcome::Stopped => {}
            }
        }
        assert_eq!(timeouts.len(), 1);
        let done = completed(timeouts.remove(0));
        assert_eq!(done.mode, FinishMode::Forced);
        assert_eq!(done.results.unanswered, 8);
        assert_eq!(done.results.correct, 1);
        assert_eq!(done.results.wrong, 1);
        assert!(matches!(tryout.tick().await.unwrap(), TickOutcome::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_lands_on_sixtieth_tick() {
        let store = Arc::new(InMemoryStore::new());
        let pkg = seed(&store, 1, 1, false).await;
        let mut tryout = start_session(store.clone(), &user(), &pkg, quick_config())
            .await
            .unwrap();
        for _ in 0..59 {
            assert!(matches!(tryout.tick().await.unwrap(), TickOutcome::Running(_)));
        }
        assert!(matches!(
            tryout.tick().await.unwrap(),
            TickOutcome::TimedOut(FinishOutcome::Completed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_time_is_recorded_per_question() {
        let store = Arc::new(InMemoryStore::new());
        let pkg = seed(&store, 2, 10, false).await;
        let mut tryout = start_session(store.clone(), &user(), &pkg, quick_config())
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        tryout.select_answer(AnswerChoice::A).unwrap();
        tryout.next();
        tokio::time::advance(Duration::from_secs(50)).await;
        tryout.select_answer(AnswerChoice::B).unwrap();

        let done = completed(tryout.finish(FinishMode::Manual).await.unwrap());
        let total: u64 = done
            .results
            .tag_stats
            .iter()
            .map(|t| t.total_time_seconds)
            .sum();
        assert_eq!(total, 80);
    }

    #[tokio::test]
    async fn navigation_clamps() {
        let store = Arc::new(InMemoryStore::new());
        let pkg = seed(&store, 3, 10, false).await;
        let mut tryout = start_session(store.clone(), &user(), &pkg, quick_config())
            .await
            .unwrap();
        assert_eq!(tryout.previous(), 0);
        assert_eq!(tryout.goto(10), 2);
        assert_eq!(tryout.next(), 2);
        assert_eq!(tryout.current_question().question_number, 3);
    }
}
