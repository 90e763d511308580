//! JSON file backend.
//!
//! Keeps the whole store in memory and rewrites the file after every
//! successful mutation. A mutation whose file write fails is undone in memory
//! as well. Intended for single-user local use.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use tryout_core::memory::{InMemoryStore, StoreSnapshot};
use tryout_core::traits::{Collection, EntityStore, Query, Record};
use tryout_core::Result;

use crate::error::StoreError;

/// An entity store persisted as one pretty-printed JSON document.
pub struct JsonFileStore {
    path: PathBuf,
    inner: InMemoryStore,
    /// Serializes mutate-then-persist so the file never lags a later write.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let snapshot = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                StoreSnapshot::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    StoreError::Decode(format!("{}: {e}", path.display()))
                })?
            }
        } else {
            StoreSnapshot::new()
        };
        tracing::debug!(
            "opened data file {} ({} collections)",
            path.display(),
            snapshot.len()
        );

        Ok(Self {
            path,
            inner: InMemoryStore::from_snapshot(snapshot),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.inner.snapshot())
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Persist, or put `collection` back to `before` if the file cannot be written.
    async fn persist_or_rollback(
        &self,
        collection: Collection,
        before: Option<Vec<Record>>,
    ) -> Result<(), StoreError> {
        if let Err(e) = self.persist().await {
            warn!(%collection, path = %self.path.display(), "rolling back unsaved write: {e}");
            self.inner.replace_collection(collection, before);
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for JsonFileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Record> {
        self.inner.get(collection, id).await
    }

    async fn filter(&self, collection: Collection, query: &Query) -> Result<Vec<Record>> {
        self.inner.filter(collection, query).await
    }

    #[instrument(skip(self, fields), fields(path = %self.path.display()))]
    async fn create(&self, collection: Collection, fields: Record) -> Result<Record> {
        let _guard = self.write_lock.lock().await;
        let before = self.inner.collection(collection);
        let record = self.inner.create(collection, fields).await?;
        self.persist_or_rollback(collection, before).await?;
        Ok(record)
    }

    #[instrument(skip(self, fields), fields(path = %self.path.display()))]
    async fn update(&self, collection: Collection, id: &str, fields: Record) -> Result<Record> {
        let _guard = self.write_lock.lock().await;
        let before = self.inner.collection(collection);
        let record = self.inner.update(collection, id, fields).await?;
        self.persist_or_rollback(collection, before).await?;
        Ok(record)
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let before = self.inner.collection(collection);
        self.inner.delete(collection, id).await?;
        self.persist_or_rollback(collection, before).await?;
        Ok(())
    }

    #[instrument(skip(self, key, fields), fields(path = %self.path.display()))]
    async fn upsert(
        &self,
        collection: Collection,
        key: &Record,
        fields: Record,
    ) -> Result<Record> {
        let _guard = self.write_lock.lock().await;
        let before = self.inner.collection(collection);
        let record = self.inner.upsert(collection, key, fields).await?;
        self.persist_or_rollback(collection, before).await?;
        Ok(record)
    }
}
