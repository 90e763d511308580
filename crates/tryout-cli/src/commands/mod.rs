//! Subcommand implementations.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};

use tryout_core::context::SessionContext;
use tryout_core::model::User;
use tryout_core::traits::EntityStore;
use tryout_core::TryoutError;
use tryout_store::{create_backend, load_config_from, Backend, TryoutConfig};

pub mod account;
pub mod admin;
pub mod history;
pub mod import;
pub mod init;
pub mod packages;
pub mod pay;
pub mod ranking;
pub mod report;
pub mod settings;
pub mod take;
pub mod validate;

/// Configuration, backend and signed-in user shared by the store-backed commands.
pub struct App {
    pub config: TryoutConfig,
    pub backend: Backend,
    pub context: SessionContext,
}

impl App {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config_from(config_path)?;
        let backend = create_backend(&config.store)?;
        let context = SessionContext::load(&config.context_file)?;
        Ok(Self {
            config,
            backend,
            context,
        })
    }

    pub fn store(&self) -> &dyn EntityStore {
        self.backend.store.as_ref()
    }

    pub fn user(&self) -> Result<&User> {
        Ok(self.context.require_user()?)
    }

    pub fn admin(&self) -> Result<&User> {
        Ok(self.context.require_admin()?)
    }
}

/// Package price: `Free`, or a rupiah amount.
pub fn format_price(amount: u64) -> String {
    if amount == 0 {
        return "Free".to_string();
    }
    format_rupiah(amount)
}

/// Rupiah amount with thousands separators, e.g. `Rp 25.000`.
pub fn format_rupiah(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    format!("Rp {grouped}")
}

pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map_or("-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

/// `true` if `err` is a `NotFound` from the store.
pub fn is_not_found(err: &TryoutError) -> bool {
    matches!(err, TryoutError::NotFound { .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_formatting() {
        assert_eq!(format_price(0), "Free");
        assert_eq!(format_price(500), "Rp 500");
        assert_eq!(format_price(25000), "Rp 25.000");
        assert_eq!(format_price(1250000), "Rp 1.250.000");
        assert_eq!(format_rupiah(0), "Rp 0");
    }
}
