//! Session report types with JSON persistence and Markdown rendering.

use std::path::Path;

use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TryoutError};
use crate::history::load_session;
use crate::model::{
    AnswerChoice, Question, QuestionPackage, QuestionTagStats, TryoutSession, User, UserAnswer,
};
use crate::repo::repo;
use crate::scoring::{compute_results, live_answers, TagStatsDraft};
use crate::traits::{EntityStore, OrderSpec, Query};

/// Title used when the session's package no longer exists.
const MISSING_PACKAGE_TITLE: &str = "(deleted package)";

/// A complete report of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub participant: String,
    pub package: PackageSummary,
    pub session: TryoutSession,
    /// Per-category breakdown, in question order.
    pub tag_stats: Vec<TagStatsDraft>,
    /// Every question with the participant's answer.
    pub review: Vec<QuestionReview>,
}

/// Summary of a package (without its questions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSummary {
    pub id: String,
    pub title: String,
    pub duration_minutes: u32,
    pub question_count: usize,
}

/// One reviewed question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionReview {
    pub number: u32,
    pub text: String,
    pub category: String,
    pub answer: Option<AnswerChoice>,
    pub correct_answer: AnswerChoice,
    pub correct_text: String,
    pub is_correct: bool,
    pub time_spent_seconds: u64,
    pub explanation: String,
}

impl SessionReport {
    /// Assemble the report of `session_id` as visible to `viewer`.
    pub async fn build(store: &dyn EntityStore, viewer: &User, session_id: &str) -> Result<Self> {
        let session = load_session(store, viewer, session_id).await?;

        let package = match repo::<QuestionPackage>(store).get(&session.package_id).await {
            Ok(package) => Some(package),
            Err(TryoutError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        let questions = repo::<Question>(store)
            .filter(
                &Query::new()
                    .eq("package_id", session.package_id.as_str())
                    .order_by(OrderSpec::asc("question_number")),
            )
            .await?;
        let answers = repo::<UserAnswer>(store)
            .filter(&Query::new().eq("session_id", session_id))
            .await?;
        let stored_stats = repo::<QuestionTagStats>(store)
            .filter(&Query::new().eq("session_id", session_id))
            .await?;

        let participant = if session.user_id == viewer.id {
            viewer.full_name.clone()
        } else {
            session.user_id.clone()
        };

        Ok(Self::assemble(
            participant,
            package,
            session,
            &questions,
            &answers,
            stored_stats,
        ))
    }

    /// Pure part of [`SessionReport::build`].
    pub fn assemble(
        participant: String,
        package: Option<QuestionPackage>,
        session: TryoutSession,
        questions: &[Question],
        answers: &[UserAnswer],
        stored_stats: Vec<QuestionTagStats>,
    ) -> Self {
        let live = live_answers(questions, answers);
        let review = questions
            .iter()
            .map(|q| {
                let answer = live.get(q.id.as_str());
                let (main, sub) = q.category_pair();
                QuestionReview {
                    number: q.question_number,
                    text: q.question_text.clone(),
                    category: format!("{main} / {sub}"),
                    answer: answer.and_then(|a| a.user_answer),
                    correct_answer: q.correct_answer,
                    correct_text: q.option(q.correct_answer).to_string(),
                    is_correct: answer.is_some_and(|a| a.is_correct),
                    time_spent_seconds: answer.map_or(0, |a| a.time_spent_seconds),
                    explanation: q.explanation.clone(),
                }
            })
            .collect();

        let tag_stats = if stored_stats.is_empty() {
            compute_results(questions, answers).tag_stats
        } else {
            stored_stats
                .into_iter()
                .map(|s| TagStatsDraft {
                    main_category: s.main_category,
                    sub_category: s.sub_category,
                    total_questions: s.total_questions,
                    correct_answers: s.correct_answers,
                    wrong_answers: s.wrong_answers,
                    unanswered: s.unanswered,
                    total_time_seconds: s.total_time_seconds,
                    average_time_seconds: s.average_time_seconds,
                })
                .collect()
        };

        let package = match package {
            Some(p) => PackageSummary {
                id: p.id,
                title: p.title,
                duration_minutes: p.duration_minutes,
                question_count: questions.len(),
            },
            None => PackageSummary {
                id: session.package_id.clone(),
                title: MISSING_PACKAGE_TITLE.to_string(),
                duration_minutes: 0,
                question_count: questions.len(),
            },
        };

        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            participant,
            package,
            session,
            tag_stats,
            review,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> AnyResult<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> AnyResult<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: SessionReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let s = &self.session;

        md.push_str(&format!("# {}\n\n", self.package.title));
        md.push_str(&format!("**Participant:** {}  \n", self.participant));
        md.push_str(&format!(
            "**Started:** {}  \n",
            s.start_time.format("%Y-%m-%d %H:%M UTC")
        ));
        md.push_str(&format!("**Status:** {}\n\n", s.status));

        if s.is_completed() {
            md.push_str(&format!(
                "**Score:** {} (correct {}, wrong {}, unanswered {})\n\n",
                s.total_score.unwrap_or(0),
                s.correct_answers.unwrap_or(0),
                s.wrong_answers.unwrap_or(0),
                s.unanswered.unwrap_or(0)
            ));
        }

        if !self.tag_stats.is_empty() {
            md.push_str("## Categories\n\n");
            md.push_str("| Category | Sub category | Questions | Correct | Wrong | Blank | Accuracy | Avg time |\n");
            md.push_str("|----------|--------------|-----------|---------|-------|-------|----------|----------|\n");
            for t in &self.tag_stats {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {} | {}% | {}s |\n",
                    t.main_category,
                    t.sub_category,
                    t.total_questions,
                    t.correct_answers,
                    t.wrong_answers,
                    t.unanswered,
                    t.accuracy_percent(),
                    t.average_time_seconds
                ));
            }
            md.push('\n');
        }

        if !self.review.is_empty() {
            md.push_str("## Review\n\n");
            md.push_str("| # | Your answer | Correct | Result | Time |\n");
            md.push_str("|---|-------------|---------|--------|------|\n");
            for r in &self.review {
                let result = match (r.answer, r.is_correct) {
                    (None, _) => "blank",
                    (Some(_), true) => "correct",
                    (Some(_), false) => "wrong",
                };
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {}s |\n",
                    r.number,
                    r.answer.map_or("-".to_string(), |a| a.to_string()),
                    r.correct_answer,
                    result,
                    r.time_spent_seconds
                ));
            }
        }

        md
    }
}
