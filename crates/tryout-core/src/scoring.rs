//! Scoring and per-category aggregation.
//!
//! Everything here is pure: it takes the questions and answer rows loaded for
//! a session and derives totals. Persisting the results is the job of
//! [`crate::session`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{percent, Question, TryoutSession, UserAnswer};

/// Aggregates for one category pair of one session, before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStatsDraft {
    pub main_category: String,
    pub sub_category: String,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    pub unanswered: u32,
    pub total_time_seconds: u64,
    /// `round(total_time_seconds / total_questions)`.
    pub average_time_seconds: u64,
}

impl TagStatsDraft {
    pub fn accuracy_percent(&self) -> u32 {
        percent(self.correct_answers, self.total_questions)
    }
}

/// Outcome of scoring one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResults {
    /// 0–100.
    pub score: u32,
    pub total: u32,
    pub correct: u32,
    pub wrong: u32,
    pub unanswered: u32,
    /// One entry per category pair, in first-appearance order of the questions.
    pub tag_stats: Vec<TagStatsDraft>,
}

/// Reduce the raw answer rows to at most one live answer per known question.
///
/// Rows without a choice, and rows for questions not in `questions`, are
/// dropped. Among duplicates the most recently updated row wins, with the
/// later row in input order breaking ties.
pub fn live_answers<'a>(
    questions: &[Question],
    answers: &'a [UserAnswer],
) -> HashMap<&'a str, &'a UserAnswer> {
    let known: HashSet<&str> = questions.iter().map(|q| q.id.as_str()).collect();
    let mut live: HashMap<&str, &UserAnswer> = HashMap::new();
    for answer in answers {
        if answer.user_answer.is_none() || !known.contains(answer.question_id.as_str()) {
            continue;
        }
        let superseded = live
            .get(answer.question_id.as_str())
            .is_some_and(|existing| existing.updated_at > answer.updated_at);
        if !superseded {
            live.insert(answer.question_id.as_str(), answer);
        }
    }
    live
}

/// Compute the score, totals and per-category breakdown of a session.
pub fn compute_results(questions: &[Question], answers: &[UserAnswer]) -> SessionResults {
    let live = live_answers(questions, answers);

    let mut order: Vec<(String, String)> = Vec::new();
    let mut groups: HashMap<(String, String), TagStatsDraft> = HashMap::new();
    let mut correct = 0u32;
    let mut wrong = 0u32;

    for question in questions {
        let key = question.category_pair();
        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            TagStatsDraft {
                main_category: key.0.clone(),
                sub_category: key.1.clone(),
                total_questions: 0,
                correct_answers: 0,
                wrong_answers: 0,
                unanswered: 0,
                total_time_seconds: 0,
                average_time_seconds: 0,
            }
        });
        group.total_questions += 1;

        match live.get(question.id.as_str()) {
            Some(answer) => {
                group.total_time_seconds += answer.time_spent_seconds;
                if answer.is_correct {
                    group.correct_answers += 1;
                    correct += 1;
                } else {
                    group.wrong_answers += 1;
                    wrong += 1;
                }
            }
            None => group.unanswered += 1,
        }
    }

    let tag_stats = order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .map(|mut group| {
            group.average_time_seconds =
                rounded_div(group.total_time_seconds, u64::from(group.total_questions));
            group
        })
        .collect();

    let total = questions.len() as u32;
    SessionResults {
        score: percent(correct, total),
        total,
        correct,
        wrong,
        unanswered: total - correct - wrong,
        tag_stats,
    }
}

fn rounded_div(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    (numerator as f64 / denominator as f64).round() as u64
}

/// Overview of a user's completed sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub completed_sessions: u32,
    pub average_score: u32,
    pub highest_score: u32,
    /// Correct answers over all questions of all completed sessions, 0–100.
    pub accuracy_percent: u32,
}

/// Summarize the completed sessions in `sessions`. `None` if there are none.
pub fn history_summary(sessions: &[TryoutSession]) -> Option<HistorySummary> {
    let completed: Vec<&TryoutSession> = sessions.iter().filter(|s| s.is_completed()).collect();
    if completed.is_empty() {
        return None;
    }

    let scores: Vec<u32> = completed
        .iter()
        .map(|s| s.total_score.unwrap_or(0))
        .collect();
    let questions: u32 = completed.iter().filter_map(|s| s.question_count()).sum();
    let correct: u32 = completed.iter().filter_map(|s| s.correct_answers).sum();

    Some(HistorySummary {
        completed_sessions: completed.len() as u32,
        average_score: average(&scores),
        highest_score: scores.iter().copied().max().unwrap_or(0),
        accuracy_percent: percent(correct, questions),
    })
}

/// Score overview of one package across participants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageScoreSummary {
    pub completed_sessions: u32,
    /// Distinct users with a completed session.
    pub participants: u32,
    pub average_score: u32,
    pub highest_score: u32,
}

pub fn package_score_summary(sessions: &[TryoutSession]) -> PackageScoreSummary {
    let completed: Vec<&TryoutSession> = sessions.iter().filter(|s| s.is_completed()).collect();
    let scores: Vec<u32> = completed
        .iter()
        .map(|s| s.total_score.unwrap_or(0))
        .collect();
    let participants: HashSet<&str> = completed.iter().map(|s| s.user_id.as_str()).collect();

    PackageScoreSummary {
        completed_sessions: completed.len() as u32,
        participants: participants.len() as u32,
        average_score: average(&scores),
        highest_score: scores.iter().copied().max().unwrap_or(0),
    }
}

fn average(scores: &[u32]) -> u32 {
    if scores.is_empty() {
        return 0;
    }
    let sum: u64 = scores.iter().map(|&s| u64::from(s)).sum();
    rounded_div(sum, scores.len() as u64) as u32
}

/// Display band for a score: `good` from 80, `fair` from 60, else `poor`.
pub fn score_band(score: u32) -> &'static str {
    match score {
        80.. => "good",
        60..=79 => "fair",
        _ => "poor",
    }
}
