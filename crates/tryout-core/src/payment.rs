//! Package access and QRIS payments.
//!
//! Settlement itself is external; [`confirm_payment`] stands in for the
//! gateway callback.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::context::ensure_admin;
use crate::error::{Result, TryoutError};
use crate::model::{
    Payment, PaymentSetting, PaymentStatus, QuestionPackage, User,
    DEFAULT_PAYMENT_TIMEOUT_MINUTES,
};
use crate::repo::repo;
use crate::traits::{EntityStore, OrderSpec, Query};

/// Payment method recorded on every payment.
pub const PAYMENT_METHOD: &str = "QRIS";

/// Merchant prefix used in QRIS codes when no setting names one.
const FALLBACK_MERCHANT: &str = "MERCHANT";

/// Whether `user_id` may take `package`, given that user's completed payments.
pub fn has_access(package: &QuestionPackage, user_id: &str, payments: &[Payment]) -> bool {
    !package.requires_payment
        || payments.iter().any(|p| {
            p.user_id == user_id
                && p.package_id == package.id
                && p.status == PaymentStatus::Completed
        })
}

/// Completed payments made by `user`.
pub async fn completed_payments(store: &dyn EntityStore, user: &User) -> Result<Vec<Payment>> {
    repo::<Payment>(store)
        .filter(
            &Query::new()
                .eq("user_id", user.id.as_str())
                .eq("status", PaymentStatus::Completed.to_string()),
        )
        .await
}

/// Look up the user's payments and decide access to `package`.
pub async fn user_has_access(
    store: &dyn EntityStore,
    user: &User,
    package: &QuestionPackage,
) -> Result<bool> {
    if !package.requires_payment {
        return Ok(true);
    }
    let payments = repo::<Payment>(store)
        .filter(
            &Query::new()
                .eq("user_id", user.id.as_str())
                .eq("package_id", package.id.as_str())
                .eq("status", PaymentStatus::Completed.to_string()),
        )
        .await?;
    Ok(has_access(package, &user.id, &payments))
}

/// The most recent payment setting, if any has been saved.
pub async fn current_settings(store: &dyn EntityStore) -> Result<Option<PaymentSetting>> {
    let mut latest = repo::<PaymentSetting>(store)
        .list(Some(OrderSpec::desc("created_at")), Some(1))
        .await?;
    Ok(latest.pop())
}

/// Editable payment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsForm {
    pub qris_merchant_id: String,
    pub qris_merchant_name: String,
    pub payment_timeout_minutes: u32,
    pub is_active: bool,
}

impl Default for SettingsForm {
    fn default() -> Self {
        Self {
            qris_merchant_id: String::new(),
            qris_merchant_name: String::new(),
            payment_timeout_minutes: DEFAULT_PAYMENT_TIMEOUT_MINUTES,
            is_active: true,
        }
    }
}

/// Update the latest setting record, or create the first one.
pub async fn save_settings(
    store: &dyn EntityStore,
    admin: &User,
    form: &SettingsForm,
) -> Result<PaymentSetting> {
    ensure_admin(admin)?;
    if form.payment_timeout_minutes == 0 {
        return Err(TryoutError::Validation(
            "payment timeout must be at least one minute".into(),
        ));
    }
    let settings = repo::<PaymentSetting>(store);
    match current_settings(store).await? {
        Some(existing) => settings.update(&existing.id, form).await,
        None => settings.create(form).await,
    }
}

/// Start (or resume) a payment for `package`.
///
/// A pending payment that has not expired yet is returned as is.
pub async fn create_payment(
    store: &dyn EntityStore,
    user: &User,
    package: &QuestionPackage,
    now: DateTime<Utc>,
) -> Result<Payment> {
    if !package.requires_payment {
        return Err(TryoutError::Validation(format!(
            "package '{}' is free",
            package.title
        )));
    }

    let payments = repo::<Payment>(store);
    let pending = payments
        .filter(
            &Query::new()
                .eq("user_id", user.id.as_str())
                .eq("package_id", package.id.as_str())
                .eq("status", PaymentStatus::Pending.to_string()),
        )
        .await?;
    if let Some(open) = pending.into_iter().find(|p| p.expires_at > now) {
        return Ok(open);
    }

    let settings = current_settings(store).await?;
    let timeout = settings
        .as_ref()
        .map_or(DEFAULT_PAYMENT_TIMEOUT_MINUTES, |s| s.payment_timeout_minutes);
    let merchant = settings
        .as_ref()
        .map(|s| s.qris_merchant_id.trim())
        .filter(|id| !id.is_empty())
        .unwrap_or(FALLBACK_MERCHANT);

    let payment = payments
        .create(&json!({
            "user_id": user.id,
            "package_id": package.id,
            "amount": package.price,
            "payment_method": PAYMENT_METHOD,
            "status": PaymentStatus::Pending,
            "qris_code": format!("{merchant}-{}", now.timestamp_millis()),
            "expires_at": now + Duration::minutes(i64::from(timeout)),
        }))
        .await?;
    info!(payment = %payment.id, package = %package.id, amount = package.price, "payment created");
    Ok(payment)
}

/// Reload a payment, expiring it if its window has passed.
pub async fn refresh_payment(
    store: &dyn EntityStore,
    payment_id: &str,
    now: DateTime<Utc>,
) -> Result<Payment> {
    let payments = repo::<Payment>(store);
    let payment = payments.get(payment_id).await?;
    if payment.status == PaymentStatus::Pending && payment.expires_at <= now {
        info!(payment = %payment.id, "payment expired");
        return payments
            .update(payment_id, &json!({"status": PaymentStatus::Expired}))
            .await;
    }
    Ok(payment)
}

/// Mark a pending payment as settled.
pub async fn confirm_payment(
    store: &dyn EntityStore,
    payment_id: &str,
    now: DateTime<Utc>,
) -> Result<Payment> {
    let payment = refresh_payment(store, payment_id, now).await?;
    match payment.status {
        PaymentStatus::Completed => Ok(payment),
        PaymentStatus::Pending => {
            info!(payment = %payment.id, "payment completed");
            repo::<Payment>(store)
                .update(payment_id, &json!({"status": PaymentStatus::Completed}))
                .await
        }
        status => Err(TryoutError::Validation(format!(
            "payment {payment_id} is {status}"
        ))),
    }
}

/// Whole seconds until the payment window closes.
pub fn seconds_left(payment: &Payment, now: DateTime<Utc>) -> u64 {
    (payment.expires_at - now).num_seconds().max(0) as u64
}
