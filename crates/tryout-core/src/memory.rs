//! In-memory entity store.
//!
//! Used by tests throughout the workspace and as the engine behind the JSON
//! file backend in `tryout-store`.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{Result, TryoutError};
use crate::traits::{Collection, EntityStore, Query, Record};

/// Raw contents of a store: collection name → records in insertion order.
pub type StoreSnapshot = BTreeMap<String, Vec<Record>>;

/// A mutex-guarded, process-local entity store.
///
/// Write failures and latency can be injected to exercise error paths.
pub struct InMemoryStore {
    data: Mutex<StoreSnapshot>,
    /// Collections whose writes are rejected with a remote error.
    failing: Mutex<HashSet<Collection>>,
    /// Artificial latency applied to every write.
    write_delay: Option<Duration>,
    write_count: AtomicU32,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::from_snapshot(StoreSnapshot::new())
    }

    /// Create a store pre-populated with `snapshot`.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            data: Mutex::new(snapshot),
            failing: Mutex::new(HashSet::new()),
            write_delay: None,
            write_count: AtomicU32::new(0),
        }
    }

    /// Delay every write by `delay` (honours tokio's paused clock in tests).
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Make every subsequent write to `collection` fail.
    pub fn fail_writes_to(&self, collection: Collection) {
        self.failing.lock().unwrap().insert(collection);
    }

    /// Undo [`InMemoryStore::fail_writes_to`].
    pub fn restore_writes_to(&self, collection: Collection) {
        self.failing.lock().unwrap().remove(&collection);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u32 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.data.lock().unwrap().clone()
    }

    /// Copy of one collection, `None` if it was never written.
    pub fn collection(&self, collection: Collection) -> Option<Vec<Record>> {
        self.data.lock().unwrap().get(collection.name()).cloned()
    }

    /// Put back a copy taken with [`InMemoryStore::collection`].
    pub fn replace_collection(&self, collection: Collection, records: Option<Vec<Record>>) {
        let mut data = self.data.lock().unwrap();
        match records {
            Some(records) => {
                data.insert(collection.name().to_string(), records);
            }
            None => {
                data.remove(collection.name());
            }
        }
    }

    /// Number of records in `collection`.
    pub fn count(&self, collection: Collection) -> usize {
        self.data
            .lock()
            .unwrap()
            .get(collection.name())
            .map_or(0, Vec::len)
    }

    async fn before_write(&self, collection: Collection) -> Result<()> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&collection) {
            return Err(TryoutError::Remote(format!(
                "write to {collection} rejected"
            )));
        }
        Ok(())
    }

    fn insert_locked(data: &mut StoreSnapshot, collection: Collection, fields: Record) -> Record {
        let now = timestamp();
        let mut record = fields;
        record.insert(
            "id".into(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
        record.insert("created_at".into(), now.clone());
        record.insert("updated_at".into(), now);
        data.entry(collection.name().to_string())
            .or_default()
            .push(record.clone());
        record
    }

    fn merge(record: &mut Record, fields: Record) {
        for (key, value) in fields {
            if key != "id" && key != "created_at" {
                record.insert(key, value);
            }
        }
        record.insert("updated_at".into(), timestamp());
    }
}

fn timestamp() -> Value {
    serde_json::to_value(Utc::now()).unwrap_or(Value::Null)
}

fn record_id(record: &Record) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Total order over JSON values used for `order` specs.
///
/// Null sorts first; RFC 3339 strings compare as instants.
pub fn compare_values(a: &Value, b: &Value) -> CmpOrdering {
    match (a, b) {
        (Value::Null, Value::Null) => CmpOrdering::Equal,
        (Value::Null, _) => CmpOrdering::Less,
        (_, Value::Null) => CmpOrdering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal)
        }
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Record> {
        let data = self.data.lock().unwrap();
        data.get(collection.name())
            .and_then(|records| records.iter().find(|r| record_id(r) == Some(id)))
            .cloned()
            .ok_or_else(|| TryoutError::not_found(collection, id))
    }

    async fn filter(&self, collection: Collection, query: &Query) -> Result<Vec<Record>> {
        let data = self.data.lock().unwrap();
        let mut records: Vec<Record> = data
            .get(collection.name())
            .map(|records| {
                records
                    .iter()
                    .filter(|r| query.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            records.sort_by(|a, b| {
                let va = a.get(&order.field).unwrap_or(&Value::Null);
                let vb = b.get(&order.field).unwrap_or(&Value::Null);
                let ord = compare_values(va, vb);
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn create(&self, collection: Collection, fields: Record) -> Result<Record> {
        self.before_write(collection).await?;
        let mut data = self.data.lock().unwrap();
        let record = Self::insert_locked(&mut data, collection, fields);
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(record)
    }

    async fn update(&self, collection: Collection, id: &str, fields: Record) -> Result<Record> {
        self.before_write(collection).await?;
        let mut data = self.data.lock().unwrap();
        let record = data
            .get_mut(collection.name())
            .and_then(|records| records.iter_mut().find(|r| record_id(r) == Some(id)))
            .ok_or_else(|| TryoutError::not_found(collection, id))?;
        Self::merge(record, fields);
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(record.clone())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        self.before_write(collection).await?;
        let mut data = self.data.lock().unwrap();
        let records = data
            .get_mut(collection.name())
            .ok_or_else(|| TryoutError::not_found(collection, id))?;
        let before = records.len();
        records.retain(|r| record_id(r) != Some(id));
        if records.len() == before {
            return Err(TryoutError::not_found(collection, id));
        }
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn upsert(
        &self,
        collection: Collection,
        key: &Record,
        fields: Record,
    ) -> Result<Record> {
        self.before_write(collection).await?;
        let query = Query {
            filter: key.clone(),
            ..Query::default()
        };
        // Lookup and write happen under one lock: no interleaving writer can
        // slip a duplicate in between.
        let mut data = self.data.lock().unwrap();
        let existing = data
            .get(collection.name())
            .and_then(|records| records.iter().position(|r| query.matches(r)));
        let record = match existing {
            Some(index) => {
                let records = data.entry(collection.name().to_string()).or_default();
                Self::merge(&mut records[index], fields);
                records[index].clone()
            }
            None => {
                let mut merged = key.clone();
                merged.extend(fields);
                Self::insert_locked(&mut data, collection, merged)
            }
        };
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(record)
    }
}
