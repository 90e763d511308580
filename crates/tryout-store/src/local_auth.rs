//! Accounts kept in the entity store itself, for the memory and file backends.
//!
//! Users are stored in the `User` collection next to an argon2 `password_hash`
//! field; the hash never leaves this module.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::instrument;

use tryout_core::model::User;
use tryout_core::repo::{from_record, to_record};
use tryout_core::traits::{
    AuthProvider, Collection, Credentials, EntityStore, Query, Record, Registration,
};
use tryout_core::{Result, TryoutError};

use crate::error::StoreError;

const PASSWORD_HASH_FIELD: &str = "password_hash";

/// Email/password accounts backed by an [`EntityStore`].
pub struct LocalAuth {
    store: Arc<dyn EntityStore>,
    /// Makes the duplicate-email check and the insert one step.
    register_lock: Mutex<()>,
}

impl LocalAuth {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            register_lock: Mutex::new(()),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Record>> {
        let mut found = self
            .store
            .filter(Collection::User, &Query::new().eq("email", email).limit(1))
            .await?;
        Ok(found.pop())
    }
}

/// Hash on the blocking pool; argon2 is deliberately slow.
async fn hash_password(password: &str) -> Result<String, StoreError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| StoreError::Hash(e.to_string()))
    })
    .await
    .map_err(|e| StoreError::Hash(format!("hash task failed: {e}")))?
}

async fn verify_password(password: &str, hash: &str) -> bool {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || {
        PasswordHash::new(&hash).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
    })
    .await
    .unwrap_or(false)
}

#[async_trait]
impl AuthProvider for LocalAuth {
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    async fn register(&self, registration: &Registration) -> Result<User> {
        let _guard = self.register_lock.lock().await;
        if self.find_by_email(&registration.email).await?.is_some() {
            return Err(TryoutError::Validation(
                "email is already registered".into(),
            ));
        }

        let mut fields = to_record(&serde_json::json!({
            "full_name": registration.full_name,
            "email": registration.email,
            "phone": registration.phone,
            "is_admin": registration.is_admin,
            "subscription_status": registration.subscription_status,
        }))?;
        let hash = hash_password(&registration.password).await?;
        fields.insert(PASSWORD_HASH_FIELD.into(), Value::String(hash));

        let record = self.store.create(Collection::User, fields).await?;
        tracing::debug!("created local account");
        from_record(record)
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn login(&self, credentials: &Credentials) -> Result<User> {
        let record = self
            .find_by_email(&credentials.email)
            .await?
            .ok_or(TryoutError::InvalidCredentials)?;
        let hash = record
            .get(PASSWORD_HASH_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !verify_password(&credentials.password, hash).await {
            return Err(TryoutError::InvalidCredentials);
        }
        from_record(record)
    }

    async fn get_user(&self, id: &str) -> Result<User> {
        let record = self.store.get(Collection::User, id).await?;
        from_record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tryout_core::memory::InMemoryStore;

    fn registration(email: &str) -> Registration {
        Registration {
            full_name: "Budi Santoso".into(),
            email: email.into(),
            phone: "0812".into(),
            password: "rahasia123".into(),
            is_admin: false,
            subscription_status: "inactive".into(),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let store = Arc::new(InMemoryStore::new());
        let auth = LocalAuth::new(store.clone());

        let user = auth.register(&registration("budi@example.com")).await.unwrap();
        assert_eq!(user.full_name, "Budi Santoso");
        assert_eq!(user.subscription_status.as_deref(), Some("inactive"));

        let raw = store.get(Collection::User, &user.id).await.unwrap();
        let hash = raw[PASSWORD_HASH_FIELD].as_str().unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(!hash.contains("rahasia123"));

        let logged_in = auth
            .login(&Credentials {
                email: "budi@example.com".into(),
                password: "rahasia123".into(),
            })
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(auth.get_user(&user.id).await.unwrap(), logged_in);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_rejected() {
        let auth = LocalAuth::new(Arc::new(InMemoryStore::new()));
        auth.register(&registration("budi@example.com")).await.unwrap();

        for (email, password) in [
            ("budi@example.com", "wrong"),
            ("nobody@example.com", "rahasia123"),
        ] {
            let err = auth
                .login(&Credentials {
                    email: email.into(),
                    password: password.into(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, TryoutError::InvalidCredentials));
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_validation_error() {
        let store = Arc::new(InMemoryStore::new());
        let auth = LocalAuth::new(store.clone());
        auth.register(&registration("budi@example.com")).await.unwrap();
        let err = auth
            .register(&registration("budi@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, TryoutError::Validation(_)));
        assert_eq!(store.count(Collection::User), 1);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let auth = LocalAuth::new(Arc::new(InMemoryStore::new()));
        let err = auth.get_user("missing").await.unwrap_err();
        assert!(matches!(err, TryoutError::NotFound { .. }));
    }
}
