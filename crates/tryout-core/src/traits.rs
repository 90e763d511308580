//! Core trait definitions for the entity store and the auth principal.
//!
//! These async traits are implemented by the backends in `tryout-store`
//! (remote BaaS, JSON file) and by [`crate::memory::InMemoryStore`].

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::model::User;

/// A raw store record: a JSON object keyed by field name.
pub type Record = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// The named collections kept by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    Payment,
    PaymentSetting,
    Question,
    QuestionPackage,
    QuestionTagStats,
    TryoutSession,
    UserAnswer,
    User,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Payment,
        Collection::PaymentSetting,
        Collection::Question,
        Collection::QuestionPackage,
        Collection::QuestionTagStats,
        Collection::TryoutSession,
        Collection::UserAnswer,
        Collection::User,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Payment => "Payment",
            Collection::PaymentSetting => "PaymentSetting",
            Collection::Question => "Question",
            Collection::QuestionPackage => "QuestionPackage",
            Collection::QuestionTagStats => "QuestionTagStats",
            Collection::TryoutSession => "TryoutSession",
            Collection::UserAnswer => "UserAnswer",
            Collection::User => "User",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed record stored in one collection.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Sort order: a field name, `-`-prefixed for descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub field: String,
    pub descending: bool,
}

impl OrderSpec {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-{}", self.field)
        } else {
            f.write_str(&self.field)
        }
    }
}

impl FromStr for OrderSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (field, descending) = match s.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        if field.is_empty() {
            return Err(format!("invalid order spec: '{s}'"));
        }
        Ok(Self {
            field: field.to_string(),
            descending,
        })
    }
}

/// An equality filter with optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Field → required value. An empty filter matches every record.
    pub filter: Record,
    pub order: Option<OrderSpec>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filter.insert(field.to_string(), value.into());
        self
    }

    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if every filter field is present in `record` with an equal value.
    pub fn matches(&self, record: &Record) -> bool {
        self.filter
            .iter()
            .all(|(field, expected)| record.get(field).unwrap_or(&Value::Null) == expected)
    }
}

// ---------------------------------------------------------------------------
// Entity store trait
// ---------------------------------------------------------------------------

/// Generic CRUD over named collections.
///
/// All operations may fail with [`crate::error::TryoutError::Remote`]; `get`,
/// `update` and `delete` fail with `NotFound` for unknown ids.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Human-readable backend name (e.g. "memory").
    fn name(&self) -> &str;

    /// Fetch one record by id.
    async fn get(&self, collection: Collection, id: &str) -> Result<Record>;

    /// Records matching `query`, ordered and limited as requested.
    async fn filter(&self, collection: Collection, query: &Query) -> Result<Vec<Record>>;

    /// Insert a record. The store assigns `id`, `created_at` and `updated_at`.
    async fn create(&self, collection: Collection, fields: Record) -> Result<Record>;

    /// Merge `fields` into an existing record.
    async fn update(&self, collection: Collection, id: &str, fields: Record) -> Result<Record>;

    /// Remove a record.
    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;

    /// Create-or-update keyed by the equality fields of `key`, as one atomic write.
    ///
    /// If a record matches `key` it is updated with `fields`; otherwise a new
    /// record is created from `key` merged with `fields`.
    async fn upsert(&self, collection: Collection, key: &Record, fields: Record)
        -> Result<Record>;

    /// Every record of a collection, ordered and limited.
    async fn list(
        &self,
        collection: Collection,
        order: Option<OrderSpec>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        let query = Query {
            filter: Record::new(),
            order,
            limit,
        };
        self.filter(collection, &query).await
    }
}

// ---------------------------------------------------------------------------
// Auth principal trait
// ---------------------------------------------------------------------------

/// Fields needed to create an account.
#[derive(Clone, Serialize, Deserialize)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub is_admin: bool,
    pub subscription_status: String,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("password", &"***")
            .field("is_admin", &self.is_admin)
            .field("subscription_status", &self.subscription_status)
            .finish()
    }
}

/// Email/password login.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// User accounts and authentication.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account. Fails with `Validation` if the email is taken.
    async fn register(&self, registration: &Registration) -> Result<User>;

    /// Verify credentials and return the user.
    async fn login(&self, credentials: &Credentials) -> Result<User>;

    /// Look a user up by id.
    async fn get_user(&self, id: &str) -> Result<User>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_spec_parse_and_display() {
        let spec: OrderSpec = "-total_score".parse().unwrap();
        assert!(spec.descending);
        assert_eq!(spec.field, "total_score");
        assert_eq!(spec.to_string(), "-total_score");

        let spec: OrderSpec = "question_number".parse().unwrap();
        assert!(!spec.descending);
        assert_eq!(spec.to_string(), "question_number");

        assert!("-".parse::<OrderSpec>().is_err());
        assert!("".parse::<OrderSpec>().is_err());
    }

    #[test]
    fn query_matches_equality_fields() {
        let query = Query::new()
            .eq("session_id", "s1")
            .eq("question_id", "q1");
        let mut record = Record::new();
        record.insert("session_id".into(), json!("s1"));
        record.insert("question_id".into(), json!("q1"));
        record.insert("user_answer".into(), json!("A"));
        assert!(query.matches(&record));

        record.insert("question_id".into(), json!("q2"));
        assert!(!query.matches(&record));
    }

    #[test]
    fn query_missing_field_only_matches_null() {
        let record = Record::new();
        assert!(Query::new().matches(&record));
        assert!(!Query::new().eq("status", "completed").matches(&record));
        assert!(Query::new().eq("end_time", Value::Null).matches(&record));
    }

    #[test]
    fn credentials_debug_masks_password() {
        let creds = Credentials {
            email: "a@b.c".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
