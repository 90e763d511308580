//! Package and question management. Every operation requires an administrator.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::context::ensure_admin;
use crate::error::{Result, TryoutError};
use crate::model::{AnswerChoice, Question, QuestionPackage, User, DEFAULT_DURATION_MINUTES};
use crate::parser::PackageFile;
use crate::repo::repo;
use crate::traits::{EntityStore, OrderSpec, Query};

/// Packages shown in the admin listing.
pub const PACKAGE_LIST_LIMIT: usize = 50;
/// Questions shown per package in the admin listing.
pub const QUESTION_LIST_LIMIT: usize = 100;

/// Editable package fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub price: u64,
    #[serde(default = "default_true")]
    pub requires_payment: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_MINUTES
}

fn default_true() -> bool {
    true
}

impl Default for PackageForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            duration_minutes: DEFAULT_DURATION_MINUTES,
            price: 0,
            requires_payment: true,
            is_active: true,
        }
    }
}

impl PackageForm {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(TryoutError::Validation("package title is required".into()));
        }
        if self.duration_minutes == 0 {
            return Err(TryoutError::Validation(
                "duration must be at least one minute".into(),
            ));
        }
        Ok(())
    }
}

/// Editable question fields. `correct_answer` is checked on submit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionForm {
    pub question_number: u32,
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub option_e: String,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub main_category: Option<String>,
    #[serde(default)]
    pub sub_category: Option<String>,
}

impl QuestionForm {
    /// Check the form and return the parsed correct answer.
    pub fn validate(&self) -> Result<AnswerChoice> {
        if self.question_number == 0 {
            return Err(TryoutError::Validation(
                "question number must be at least 1".into(),
            ));
        }
        if self.question_text.trim().is_empty() {
            return Err(TryoutError::Validation("question text is required".into()));
        }
        for (label, text) in self.options() {
            if text.trim().is_empty() {
                return Err(TryoutError::Validation(format!("option {label} is required")));
            }
        }
        self.correct_answer
            .parse::<AnswerChoice>()
            .map_err(|_| {
                TryoutError::Validation(format!(
                    "correct answer must be one of A-E, got '{}'",
                    self.correct_answer.trim()
                ))
            })
    }

    pub fn options(&self) -> [(AnswerChoice, &str); 5] {
        [
            (AnswerChoice::A, self.option_a.as_str()),
            (AnswerChoice::B, self.option_b.as_str()),
            (AnswerChoice::C, self.option_c.as_str()),
            (AnswerChoice::D, self.option_d.as_str()),
            (AnswerChoice::E, self.option_e.as_str()),
        ]
    }

    fn to_fields(&self, package_id: &str, correct: AnswerChoice) -> serde_json::Value {
        let category = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        json!({
            "package_id": package_id,
            "question_number": self.question_number,
            "question_text": self.question_text.trim(),
            "option_a": self.option_a.trim(),
            "option_b": self.option_b.trim(),
            "option_c": self.option_c.trim(),
            "option_d": self.option_d.trim(),
            "option_e": self.option_e.trim(),
            "correct_answer": correct,
            "explanation": self.explanation.trim(),
            "main_category": category(&self.main_category),
            "sub_category": category(&self.sub_category),
        })
    }
}

// ---------------------------------------------------------------------------
// Packages
// ---------------------------------------------------------------------------

pub async fn list_packages(store: &dyn EntityStore, admin: &User) -> Result<Vec<QuestionPackage>> {
    ensure_admin(admin)?;
    repo::<QuestionPackage>(store)
        .list(Some(OrderSpec::desc("created_at")), Some(PACKAGE_LIST_LIMIT))
        .await
}

pub async fn create_package(
    store: &dyn EntityStore,
    admin: &User,
    form: &PackageForm,
) -> Result<QuestionPackage> {
    ensure_admin(admin)?;
    form.validate()?;
    let mut fields = crate::repo::to_record(form)?;
    fields.insert("total_questions".into(), json!(0));
    let package = repo::<QuestionPackage>(store).create(&fields).await?;
    info!(package = %package.id, title = %package.title, "package created");
    Ok(package)
}

pub async fn update_package(
    store: &dyn EntityStore,
    admin: &User,
    package_id: &str,
    form: &PackageForm,
) -> Result<QuestionPackage> {
    ensure_admin(admin)?;
    form.validate()?;
    repo::<QuestionPackage>(store).update(package_id, form).await
}

pub async fn set_package_active(
    store: &dyn EntityStore,
    admin: &User,
    package_id: &str,
    is_active: bool,
) -> Result<QuestionPackage> {
    ensure_admin(admin)?;
    repo::<QuestionPackage>(store)
        .update(package_id, &json!({"is_active": is_active}))
        .await
}

/// Delete a package together with its questions.
pub async fn delete_package(store: &dyn EntityStore, admin: &User, package_id: &str) -> Result<()> {
    ensure_admin(admin)?;
    let packages = repo::<QuestionPackage>(store);
    packages.get(package_id).await?;

    let questions = repo::<Question>(store);
    let owned = questions
        .filter(&Query::new().eq("package_id", package_id))
        .await?;
    for question in &owned {
        questions.delete(&question.id).await?;
    }
    packages.delete(package_id).await?;
    info!(package = %package_id, questions = owned.len(), "package deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

pub async fn list_questions(
    store: &dyn EntityStore,
    admin: &User,
    package_id: &str,
) -> Result<Vec<Question>> {
    ensure_admin(admin)?;
    repo::<Question>(store)
        .filter(
            &Query::new()
                .eq("package_id", package_id)
                .order_by(OrderSpec::asc("question_number"))
                .limit(QUESTION_LIST_LIMIT),
        )
        .await
}

pub async fn create_question(
    store: &dyn EntityStore,
    admin: &User,
    package_id: &str,
    form: &QuestionForm,
) -> Result<Question> {
    ensure_admin(admin)?;
    let correct = form.validate()?;
    repo::<QuestionPackage>(store).get(package_id).await?;
    let question = repo::<Question>(store)
        .create(&form.to_fields(package_id, correct))
        .await?;
    sync_question_count(store, package_id).await?;
    Ok(question)
}

pub async fn update_question(
    store: &dyn EntityStore,
    admin: &User,
    question_id: &str,
    form: &QuestionForm,
) -> Result<Question> {
    ensure_admin(admin)?;
    let correct = form.validate()?;
    let questions = repo::<Question>(store);
    let existing = questions.get(question_id).await?;
    questions
        .update(question_id, &form.to_fields(&existing.package_id, correct))
        .await
}

pub async fn delete_question(store: &dyn EntityStore, admin: &User, question_id: &str) -> Result<()> {
    ensure_admin(admin)?;
    let questions = repo::<Question>(store);
    let question = questions.get(question_id).await?;
    questions.delete(question_id).await?;
    sync_question_count(store, &question.package_id).await?;
    Ok(())
}

/// Recount a package's questions into its cached `total_questions`.
pub async fn sync_question_count(store: &dyn EntityStore, package_id: &str) -> Result<u32> {
    let count = repo::<Question>(store)
        .filter(&Query::new().eq("package_id", package_id))
        .await?
        .len() as u32;
    repo::<QuestionPackage>(store)
        .update(package_id, &json!({"total_questions": count}))
        .await?;
    Ok(count)
}

/// Create a package and all its questions from a parsed package file.
///
/// Every question is validated before anything is written.
pub async fn import_package(
    store: &dyn EntityStore,
    admin: &User,
    file: &PackageFile,
) -> Result<QuestionPackage> {
    ensure_admin(admin)?;
    file.package.validate()?;
    let mut checked = Vec::with_capacity(file.questions.len());
    for form in &file.questions {
        let correct = form.validate().map_err(|e| match e {
            TryoutError::Validation(msg) => {
                TryoutError::Validation(format!("question {}: {msg}", form.question_number))
            }
            other => other,
        })?;
        checked.push((form, correct));
    }

    let package = create_package(store, admin, &file.package).await?;
    let questions = repo::<Question>(store);
    for (form, correct) in checked {
        questions.create(&form.to_fields(&package.id, correct)).await?;
    }
    let total = sync_question_count(store, &package.id).await?;
    info!(package = %package.id, questions = total, "package imported");
    repo::<QuestionPackage>(store).get(&package.id).await
}
