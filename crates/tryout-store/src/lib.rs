//! tryout-store: entity store and account backends.
//!
//! Implements the `EntityStore` and `AuthProvider` traits for a local JSON
//! file, a process-local memory store, and a remote backend-as-a-service.

pub mod config;
pub mod error;
pub mod file;
pub mod local_auth;
pub mod remote;

use std::sync::Arc;

use anyhow::{Context, Result};

use tryout_core::memory::InMemoryStore;
use tryout_core::traits::{AuthProvider, EntityStore};

pub use config::{load_config, load_config_from, StoreConfig, TryoutConfig};
pub use error::StoreError;
pub use file::JsonFileStore;
pub use local_auth::LocalAuth;
pub use remote::RemoteStore;

/// A configured store together with the matching account provider.
#[derive(Clone)]
pub struct Backend {
    pub store: Arc<dyn EntityStore>,
    pub auth: Arc<dyn AuthProvider>,
}

/// Create the backend described by `config`.
pub fn create_backend(config: &StoreConfig) -> Result<Backend> {
    let backend = match config {
        StoreConfig::Memory => local(Arc::new(InMemoryStore::new())),
        StoreConfig::File { path } => {
            let store = JsonFileStore::open(path)
                .with_context(|| format!("failed to open data file {}", path.display()))?;
            local(Arc::new(store))
        }
        StoreConfig::Remote {
            base_url,
            app_id,
            api_key,
        } => {
            if api_key.is_empty() {
                tracing::warn!("remote store configured without an API key");
            }
            let remote = Arc::new(
                RemoteStore::new(base_url, app_id, api_key)
                    .context("failed to configure remote store")?,
            );
            Backend {
                store: remote.clone(),
                auth: remote,
            }
        }
    };
    tracing::debug!(backend = backend.store.name(), "store ready");
    Ok(backend)
}

fn local(store: Arc<dyn EntityStore>) -> Backend {
    Backend {
        auth: Arc::new(LocalAuth::new(store.clone())),
        store,
    }
}
