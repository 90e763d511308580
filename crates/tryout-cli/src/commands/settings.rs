//! The `tryout settings` command.

use std::path::Path;

use anyhow::Result;

use tryout_core::model::PaymentSetting;
use tryout_core::payment::{current_settings, save_settings, SettingsForm};

use super::App;

pub async fn execute(
    config: Option<&Path>,
    merchant_id: Option<String>,
    merchant_name: Option<String>,
    timeout: Option<u32>,
    active: Option<bool>,
) -> Result<()> {
    let app = App::load(config)?;
    let admin = app.admin()?;
    let current = current_settings(app.store()).await?;

    let changing = merchant_id.is_some()
        || merchant_name.is_some()
        || timeout.is_some()
        || active.is_some();
    if !changing {
        match &current {
            Some(setting) => print_setting(setting),
            None => println!("No payment settings saved yet."),
        }
        return Ok(());
    }

    let mut form = current.map_or_else(SettingsForm::default, |s| SettingsForm {
        qris_merchant_id: s.qris_merchant_id,
        qris_merchant_name: s.qris_merchant_name,
        payment_timeout_minutes: s.payment_timeout_minutes,
        is_active: s.is_active,
    });
    if let Some(id) = merchant_id {
        form.qris_merchant_id = id;
    }
    if let Some(name) = merchant_name {
        form.qris_merchant_name = name;
    }
    if let Some(minutes) = timeout {
        form.payment_timeout_minutes = minutes;
    }
    if let Some(active) = active {
        form.is_active = active;
    }

    let saved = save_settings(app.store(), admin, &form).await?;
    println!("Payment settings saved.");
    print_setting(&saved);
    Ok(())
}

fn print_setting(setting: &PaymentSetting) {
    println!("Merchant id:   {}", setting.qris_merchant_id);
    println!("Merchant name: {}", setting.qris_merchant_name);
    println!("Timeout:       {} minutes", setting.payment_timeout_minutes);
    println!("Active:        {}", if setting.is_active { "yes" } else { "no" });
}
