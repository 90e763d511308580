//! The `tryout register`, `login`, `logout` and `whoami` commands.

use std::path::Path;

use anyhow::Result;

use tryout_core::account::{self, RegistrationForm};
use tryout_core::context::SessionContext;
use tryout_core::TryoutError;
use tryout_store::load_config_from;

use super::{is_not_found, App};

pub async fn register(
    config: Option<&Path>,
    full_name: String,
    email: String,
    phone: String,
    password: String,
    confirm_password: Option<String>,
) -> Result<()> {
    let mut app = App::load(config)?;
    let form = RegistrationForm {
        full_name,
        email,
        phone,
        confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
        password,
    };
    let user = account::register(app.backend.auth.as_ref(), &form, &app.config.admin_emails).await?;
    app.context.sign_in(user.clone())?;

    println!("Registered {} <{}>", user.full_name, user.email);
    if user.is_admin {
        println!("This account is an administrator.");
    }
    Ok(())
}

pub async fn login(config: Option<&Path>, email: String, password: String) -> Result<()> {
    let mut app = App::load(config)?;
    let user = account::login(app.backend.auth.as_ref(), &email, &password).await?;
    app.context.sign_in(user.clone())?;
    println!("Signed in as {} <{}>", user.full_name, user.email);
    Ok(())
}

/// Signing out only touches the marker file, so no backend is opened.
pub fn logout(config: Option<&Path>) -> Result<()> {
    let config = load_config_from(config)?;
    let mut context = SessionContext::load(&config.context_file)?;
    if context.user().is_none() {
        println!("Nobody is signed in.");
        return Ok(());
    }
    context.clear()?;
    println!("Signed out.");
    Ok(())
}

pub async fn whoami(config: Option<&Path>) -> Result<()> {
    let mut app = App::load(config)?;
    let Some(cached) = app.context.user().cloned() else {
        println!("Nobody is signed in.");
        return Ok(());
    };

    let user = match app.backend.auth.get_user(&cached.id).await {
        Ok(user) => user,
        Err(e) if is_not_found(&e) => {
            app.context.clear()?;
            return Err(TryoutError::Unauthenticated.into());
        }
        Err(e) => return Err(e.into()),
    };
    if user != cached {
        app.context.sign_in(user.clone())?;
    }

    println!("{} <{}>", user.full_name, user.email);
    println!("  id:           {}", user.id);
    println!("  phone:        {}", user.phone);
    println!("  role:         {}", if user.is_admin { "admin" } else { "member" });
    println!(
        "  subscription: {}",
        user.subscription_status.as_deref().unwrap_or("-")
    );
    Ok(())
}
