//! The signed-in user.
//!
//! The current user is carried explicitly in a [`SessionContext`] and cached
//! between CLI invocations in a small JSON marker file. The store stays
//! authoritative; a stale marker only affects what the CLI shows.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result as AnyResult};

use crate::error::{Result, TryoutError};
use crate::model::User;

/// Explicit current-user state.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    user: Option<User>,
    marker: Option<PathBuf>,
}

impl SessionContext {
    /// A context with nobody signed in and no marker file.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A context for `user` that is never persisted.
    pub fn for_user(user: User) -> Self {
        Self {
            user: Some(user),
            marker: None,
        }
    }

    /// Load the context cached at `marker`. A missing file means nobody is signed in.
    pub fn load(marker: &Path) -> AnyResult<Self> {
        let user = if marker.exists() {
            let content = std::fs::read_to_string(marker)
                .with_context(|| format!("failed to read {}", marker.display()))?;
            let user: User = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse {}", marker.display()))?;
            Some(user)
        } else {
            None
        };
        Ok(Self {
            user,
            marker: Some(marker.to_path_buf()),
        })
    }

    /// Sign `user` in and write the marker.
    pub fn sign_in(&mut self, user: User) -> AnyResult<()> {
        self.user = Some(user);
        self.save()
    }

    /// Write the marker, if this context has one.
    pub fn save(&self) -> AnyResult<()> {
        let (Some(marker), Some(user)) = (&self.marker, &self.user) else {
            return Ok(());
        };
        if let Some(parent) = marker.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(user)?;
        std::fs::write(marker, json)
            .with_context(|| format!("failed to write {}", marker.display()))?;
        Ok(())
    }

    /// Sign out and remove the marker.
    pub fn clear(&mut self) -> AnyResult<()> {
        self.user = None;
        if let Some(marker) = &self.marker {
            if marker.exists() {
                std::fs::remove_file(marker)
                    .with_context(|| format!("failed to remove {}", marker.display()))?;
            }
        }
        Ok(())
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn require_user(&self) -> Result<&User> {
        self.user.as_ref().ok_or(TryoutError::Unauthenticated)
    }

    pub fn require_admin(&self) -> Result<&User> {
        let user = self.require_user()?;
        ensure_admin(user)?;
        Ok(user)
    }
}

/// Fail with `AccessDenied` unless `user` is an administrator.
pub fn ensure_admin(user: &User) -> Result<()> {
    if user.is_admin {
        Ok(())
    } else {
        Err(TryoutError::AccessDenied(format!(
            "{} is not an administrator",
            user.email
        )))
    }
}
