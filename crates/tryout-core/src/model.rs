//! Core data model types for tryout.
//!
//! These mirror the records kept in the entity store. Every record carries a
//! store-assigned `id` plus `created_at`/`updated_at` timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::traits::{Collection, Entity};

/// Main category used when a question has none.
pub const DEFAULT_MAIN_CATEGORY: &str = "Non Tag";
/// Sub category used when a question has none.
pub const DEFAULT_SUB_CATEGORY: &str = "Umum";
/// Duration given to newly created packages, in minutes.
pub const DEFAULT_DURATION_MINUTES: u32 = 110;

/// An administrator-defined bundle of questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPackage {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Time budget for every session against this package.
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub price: u64,
    #[serde(default = "default_true")]
    pub requires_payment: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Cached question count. May be stale; scoring never relies on it.
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_MINUTES
}

fn default_true() -> bool {
    true
}

impl QuestionPackage {
    /// Session budget in seconds.
    pub fn budget_secs(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }
}

/// One of the five multiple-choice options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnswerChoice {
    A,
    B,
    C,
    D,
    E,
}

impl AnswerChoice {
    pub const ALL: [AnswerChoice; 5] = [
        AnswerChoice::A,
        AnswerChoice::B,
        AnswerChoice::C,
        AnswerChoice::D,
        AnswerChoice::E,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerChoice::A => "A",
            AnswerChoice::B => "B",
            AnswerChoice::C => "C",
            AnswerChoice::D => "D",
            AnswerChoice::E => "E",
        }
    }
}

impl fmt::Display for AnswerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(AnswerChoice::A),
            "B" => Ok(AnswerChoice::B),
            "C" => Ok(AnswerChoice::C),
            "D" => Ok(AnswerChoice::D),
            "E" => Ok(AnswerChoice::E),
            other => Err(format!("unknown answer choice: {other}")),
        }
    }
}

/// A multiple-choice question belonging to a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub package_id: String,
    /// Canonical presentation order within the package.
    pub question_number: u32,
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub option_e: String,
    pub correct_answer: AnswerChoice,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub main_category: Option<String>,
    #[serde(default)]
    pub sub_category: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Question {
    pub fn option(&self, choice: AnswerChoice) -> &str {
        match choice {
            AnswerChoice::A => &self.option_a,
            AnswerChoice::B => &self.option_b,
            AnswerChoice::C => &self.option_c,
            AnswerChoice::D => &self.option_d,
            AnswerChoice::E => &self.option_e,
        }
    }

    /// The (main, sub) category pair, with fixed defaults for missing or empty values.
    ///
    /// Values are used as stored; whitespace is not trimmed.
    pub fn category_pair(&self) -> (String, String) {
        let pick = |value: &Option<String>, fallback: &str| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        (
            pick(&self.main_category, DEFAULT_MAIN_CATEGORY),
            pick(&self.sub_category, DEFAULT_SUB_CATEGORY),
        )
    }

    pub fn is_correct(&self, choice: AnswerChoice) -> bool {
        self.correct_answer == choice
    }
}

/// Lifecycle status of a tryout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One user's attempt at a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryoutSession {
    pub id: String,
    pub user_id: String,
    pub package_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(default)]
    pub total_score: Option<u32>,
    #[serde(default)]
    pub correct_answers: Option<u32>,
    #[serde(default)]
    pub wrong_answers: Option<u32>,
    #[serde(default)]
    pub unanswered: Option<u32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryoutSession {
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// correct + wrong + unanswered, once the session is completed.
    pub fn question_count(&self) -> Option<u32> {
        Some(self.correct_answers? + self.wrong_answers? + self.unanswered?)
    }
}

/// The recorded answer for one question in one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAnswer {
    pub id: String,
    pub session_id: String,
    pub question_id: String,
    #[serde(default)]
    pub user_answer: Option<AnswerChoice>,
    pub is_correct: bool,
    #[serde(default)]
    pub time_spent_seconds: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-category performance of one session. Written once at completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionTagStats {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub package_id: String,
    pub main_category: String,
    pub sub_category: String,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub wrong_answers: u32,
    pub unanswered: u32,
    pub total_time_seconds: u64,
    pub average_time_seconds: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl QuestionTagStats {
    /// Share of correct answers in this category, 0–100.
    pub fn accuracy_percent(&self) -> u32 {
        percent(self.correct_answers, self.total_questions)
    }
}

/// `round(part / whole * 100)`, or 0 when `whole` is 0.
pub fn percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (f64::from(part) / f64::from(whole) * 100.0).round() as u32
}

/// Settlement status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Expired,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Expired => write!(f, "expired"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A payment granting access to a paid package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub user_id: String,
    pub package_id: String,
    pub amount: u64,
    pub payment_method: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub qris_code: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// QRIS merchant configuration. The most recent record is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSetting {
    pub id: String,
    #[serde(default)]
    pub qris_merchant_id: String,
    #[serde(default)]
    pub qris_merchant_name: String,
    #[serde(default = "default_payment_timeout")]
    pub payment_timeout_minutes: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Payment window used when no setting exists.
pub const DEFAULT_PAYMENT_TIMEOUT_MINUTES: u32 = 30;

fn default_payment_timeout() -> u32 {
    DEFAULT_PAYMENT_TIMEOUT_MINUTES
}

/// The authenticated principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub subscription_status: Option<String>,
}

macro_rules! entity {
    ($ty:ty, $collection:expr) => {
        impl Entity for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

entity!(QuestionPackage, Collection::QuestionPackage);
entity!(Question, Collection::Question);
entity!(TryoutSession, Collection::TryoutSession);
entity!(UserAnswer, Collection::UserAnswer);
entity!(QuestionTagStats, Collection::QuestionTagStats);
entity!(Payment, Collection::Payment);
entity!(PaymentSetting, Collection::PaymentSetting);
entity!(User, Collection::User);

#[cfg(test)]
mod tests {
    use super::*;

    fn question(main: Option<&str>, sub: Option<&str>) -> Question {
        Question {
            id: "q1".into(),
            package_id: "p1".into(),
            question_number: 1,
            question_text: "2 + 2 = ?".into(),
            option_a: "3".into(),
            option_b: "4".into(),
            option_c: "5".into(),
            option_d: "6".into(),
            option_e: "7".into(),
            correct_answer: AnswerChoice::B,
            explanation: String::new(),
            main_category: main.map(Into::into),
            sub_category: sub.map(Into::into),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn answer_choice_display_and_parse() {
        assert_eq!(AnswerChoice::C.to_string(), "C");
        assert_eq!("b".parse::<AnswerChoice>().unwrap(), AnswerChoice::B);
        assert_eq!(" E ".parse::<AnswerChoice>().unwrap(), AnswerChoice::E);
        assert!("F".parse::<AnswerChoice>().is_err());
        assert!("".parse::<AnswerChoice>().is_err());
    }

    #[test]
    fn category_pair_defaults() {
        assert_eq!(
            question(None, None).category_pair(),
            ("Non Tag".to_string(), "Umum".to_string())
        );
        assert_eq!(
            question(Some("TIU"), Some("")).category_pair(),
            ("TIU".to_string(), "Umum".to_string())
        );
        assert_eq!(
            question(Some(" TIU "), Some("  ")).category_pair(),
            (" TIU ".to_string(), "  ".to_string())
        );
        assert_eq!(
            question(Some("TWK"), Some("Pancasila")).category_pair(),
            ("TWK".to_string(), "Pancasila".to_string())
        );
    }

    #[test]
    fn option_lookup_and_correctness() {
        let q = question(None, None);
        assert_eq!(q.option(AnswerChoice::B), "4");
        assert!(q.is_correct(AnswerChoice::B));
        assert!(!q.is_correct(AnswerChoice::A));
    }

    #[test]
    fn package_defaults_from_sparse_record() {
        let pkg: QuestionPackage =
            serde_json::from_str(r#"{"id":"p1","title":"SKD Batch 1"}"#).unwrap();
        assert_eq!(pkg.duration_minutes, 110);
        assert!(pkg.requires_payment);
        assert!(pkg.is_active);
        assert_eq!(pkg.budget_secs(), 6600);
    }

    #[test]
    fn session_status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(3, 5), 60);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(2, 3), 67);
    }
}
