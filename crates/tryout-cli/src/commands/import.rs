//! The `tryout import` command.

use std::path::{Path, PathBuf};

use anyhow::Result;

use tryout_core::admin::import_package;
use tryout_core::parser::validate_package;

use super::validate::load_packages;
use super::{format_price, App};

pub async fn execute(config: Option<&Path>, path: PathBuf) -> Result<()> {
    let app = App::load(config)?;
    let admin = app.admin()?;
    let files = load_packages(&path)?;
    anyhow::ensure!(!files.is_empty(), "no package files found in {}", path.display());

    let mut imported = 0;
    for (file_path, file) in &files {
        let warnings = validate_package(file);
        if !warnings.is_empty() {
            println!("Skipping {}:", file_path.display());
            for w in &warnings {
                println!("  WARNING: {w}");
            }
            continue;
        }

        let package = import_package(app.store(), admin, file).await?;
        println!(
            "Imported \"{}\" ({} questions, {} minutes, {}) as {}",
            package.title,
            package.total_questions,
            package.duration_minutes,
            format_price(package.price),
            package.id
        );
        imported += 1;
    }

    println!("\n{imported} of {} package(s) imported.", files.len());
    Ok(())
}
