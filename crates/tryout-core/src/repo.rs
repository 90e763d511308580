//! Typed access to an [`EntityStore`].
//!
//! Converts between model structs and raw records so the rest of the crate
//! never touches `serde_json` maps directly.

use std::marker::PhantomData;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, TryoutError};
use crate::traits::{Entity, EntityStore, OrderSpec, Query, Record};

/// Typed view over one collection of a store.
pub struct Repo<'a, T> {
    store: &'a dyn EntityStore,
    _entity: PhantomData<fn() -> T>,
}

/// Typed repository for entity `T`.
pub fn repo<T: Entity>(store: &dyn EntityStore) -> Repo<'_, T> {
    Repo {
        store,
        _entity: PhantomData,
    }
}

impl<T: Entity> Repo<'_, T> {
    pub async fn get(&self, id: &str) -> Result<T> {
        let record = self.store.get(T::COLLECTION, id).await?;
        from_record(record)
    }

    pub async fn filter(&self, query: &Query) -> Result<Vec<T>> {
        let records = self.store.filter(T::COLLECTION, query).await?;
        records.into_iter().map(from_record).collect()
    }

    pub async fn list(&self, order: Option<OrderSpec>, limit: Option<usize>) -> Result<Vec<T>> {
        let records = self.store.list(T::COLLECTION, order, limit).await?;
        records.into_iter().map(from_record).collect()
    }

    /// First record matching `query`, if any.
    pub async fn find_one(&self, query: Query) -> Result<Option<T>> {
        let mut found = self.filter(&query.limit(1)).await?;
        Ok(found.pop())
    }

    pub async fn create<F: Serialize + ?Sized>(&self, fields: &F) -> Result<T> {
        let record = self.store.create(T::COLLECTION, to_record(fields)?).await?;
        from_record(record)
    }

    pub async fn update<F: Serialize + ?Sized>(&self, id: &str, fields: &F) -> Result<T> {
        let record = self
            .store
            .update(T::COLLECTION, id, to_record(fields)?)
            .await?;
        from_record(record)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(T::COLLECTION, id).await
    }

    pub async fn upsert<F: Serialize + ?Sized>(&self, key: &Query, fields: &F) -> Result<T> {
        let record = self
            .store
            .upsert(T::COLLECTION, &key.filter, to_record(fields)?)
            .await?;
        from_record(record)
    }
}

/// Serialize a field set into a record. Anything but a JSON object is rejected.
pub fn to_record<F: Serialize + ?Sized>(fields: &F) -> Result<Record> {
    match serde_json::to_value(fields) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(TryoutError::Validation(format!(
            "expected an object of fields, got {other}"
        ))),
        Err(e) => Err(TryoutError::Validation(format!(
            "failed to serialize fields: {e}"
        ))),
    }
}

/// Deserialize a record into an entity. A record the model cannot read is a
/// store fault, not a user error.
pub fn from_record<T: Entity>(record: Record) -> Result<T> {
    serde_json::from_value(Value::Object(record)).map_err(|e| {
        TryoutError::Remote(format!("malformed {} record: {e}", T::COLLECTION))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::model::QuestionPackage;
    use serde_json::json;

    #[test]
    fn to_record_rejects_non_objects() {
        assert!(to_record(&json!([1, 2])).is_err());
        assert!(to_record(&json!({"title": "x"})).is_ok());
    }

    #[tokio::test]
    async fn typed_create_and_get() {
        let store = InMemoryStore::new();
        let packages = repo::<QuestionPackage>(&store);
        let created = packages
            .create(&json!({"title": "SKD 1", "duration_minutes": 90, "price": 50000}))
            .await
            .unwrap();
        assert!(!created.id.is_empty());
        assert!(created.created_at.is_some());

        let fetched = packages.get(&created.id).await.unwrap();
        assert_eq!(fetched.title, "SKD 1");
        assert_eq!(fetched.duration_minutes, 90);
    }

    #[tokio::test]
    async fn malformed_record_is_remote_error() {
        let store = InMemoryStore::new();
        let record = store
            .create(crate::traits::Collection::QuestionPackage, Record::new())
            .await
            .unwrap();
        let id = record["id"].as_str().unwrap().to_string();
        let err = repo::<QuestionPackage>(&store).get(&id).await.unwrap_err();
        assert!(err.is_remote());
    }
}
