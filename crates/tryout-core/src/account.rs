//! Account registration and login.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TryoutError};
use crate::model::User;
use crate::traits::{AuthProvider, Credentials, Registration};

/// Subscription status given to every new account.
pub const INITIAL_SUBSCRIPTION_STATUS: &str = "inactive";

/// The sign-up form as entered by the user.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("password", &"***")
            .field("confirm_password", &"***")
            .finish()
    }
}

impl RegistrationForm {
    /// Check required fields and the password confirmation.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("full name", &self.full_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("password", &self.password),
        ];
        for (label, value) in required {
            if value.trim().is_empty() {
                return Err(TryoutError::Validation(format!("{label} is required")));
            }
        }
        if !self.email.contains('@') {
            return Err(TryoutError::Validation(format!(
                "'{}' is not an email address",
                self.email.trim()
            )));
        }
        if self.password != self.confirm_password {
            return Err(TryoutError::Validation(
                "password and confirmation do not match".into(),
            ));
        }
        Ok(())
    }

    /// Build the registration, granting admin rights to listed emails.
    pub fn to_registration(&self, admin_emails: &[String]) -> Registration {
        let email = normalize_email(&self.email);
        Registration {
            full_name: self.full_name.trim().to_string(),
            is_admin: admin_emails.iter().any(|a| normalize_email(a) == email),
            email,
            phone: self.phone.trim().to_string(),
            password: self.password.clone(),
            subscription_status: INITIAL_SUBSCRIPTION_STATUS.to_string(),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate `form` and create the account.
pub async fn register(
    auth: &dyn AuthProvider,
    form: &RegistrationForm,
    admin_emails: &[String],
) -> Result<User> {
    form.validate()?;
    let user = auth.register(&form.to_registration(admin_emails)).await?;
    info!(user = %user.id, admin = user.is_admin, "account registered");
    Ok(user)
}

/// Authenticate by email and password.
pub async fn login(auth: &dyn AuthProvider, email: &str, password: &str) -> Result<User> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(TryoutError::Validation(
            "email and password are required".into(),
        ));
    }
    let credentials = Credentials {
        email: normalize_email(email),
        password: password.to_string(),
    };
    let user = auth.login(&credentials).await?;
    info!(user = %user.id, "signed in");
    Ok(user)
}
