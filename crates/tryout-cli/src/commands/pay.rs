//! The `tryout pay` command.

use std::path::Path;

use anyhow::Result;
use chrono::Utc;

use tryout_core::countdown::format_clock;
use tryout_core::model::{PaymentStatus, QuestionPackage};
use tryout_core::payment::{confirm_payment, create_payment, seconds_left};
use tryout_core::repo::repo;

use super::{format_price, App};

pub async fn execute(config: Option<&Path>, package_id: String, confirm: bool) -> Result<()> {
    let app = App::load(config)?;
    let user = app.user()?;
    let package = repo::<QuestionPackage>(app.store()).get(&package_id).await?;

    let now = Utc::now();
    let payment = create_payment(app.store(), user, &package, now).await?;
    println!("Package:  {}", package.title);
    println!("Amount:   {}", format_price(payment.amount));
    println!("Method:   {}", payment.payment_method);
    println!("QRIS:     {}", payment.qris_code);

    if !confirm {
        println!(
            "Pay within {} (payment {}).",
            format_clock(seconds_left(&payment, now)),
            payment.id
        );
        println!("Run again with --confirm once the transfer has gone through.");
        return Ok(());
    }

    let payment = confirm_payment(app.store(), &payment.id, Utc::now()).await?;
    if payment.status == PaymentStatus::Completed {
        println!("Payment {} completed. The package is now open.", payment.id);
    }
    Ok(())
}
