//! The `tryout init` command.

use std::path::Path;

use anyhow::Result;

use tryout_store::config::STARTER_CONFIG;

pub fn execute() -> Result<()> {
    if Path::new("tryout.toml").exists() {
        println!("tryout.toml already exists, skipping.");
    } else {
        std::fs::write("tryout.toml", STARTER_CONFIG)?;
        println!("Created tryout.toml");
    }

    std::fs::create_dir_all("packages")?;
    let example_path = Path::new("packages/example.toml");
    if example_path.exists() {
        println!("packages/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_PACKAGE)?;
        println!("Created packages/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Add your email to admin_emails in tryout.toml");
    println!("  2. Run: tryout register --name ... --email ... --phone ... --password ...");
    println!("  3. Run: tryout import --package packages/example.toml");
    println!("  4. Run: tryout packages");

    Ok(())
}

const EXAMPLE_PACKAGE: &str = r#"[package]
title = "Example Tryout"
description = "Three warm-up questions"
duration_minutes = 10
requires_payment = false

[[questions]]
text = "Ibu kota Indonesia saat ini adalah"
answer = "B"
main_category = "TWK"
sub_category = "Nasionalisme"
explanation = "Jakarta masih berstatus ibu kota."

[questions.options]
A = "Bandung"
B = "Jakarta"
C = "Surabaya"
D = "Medan"
E = "Makassar"

[[questions]]
text = "15% dari 200 adalah"
answer = "C"
main_category = "TIU"
sub_category = "Aritmatika"
explanation = "0.15 x 200 = 30"

[questions.options]
A = "15"
B = "20"
C = "30"
D = "35"
E = "45"

[[questions]]
text = "Rekan kerja meminta bantuan saat Anda sibuk. Sikap Anda"
answer = "D"
main_category = "TKP"
sub_category = "Pelayanan Publik"

[questions.options]
A = "Menolak"
B = "Mengabaikan"
C = "Menyuruh orang lain"
D = "Membantu setelah pekerjaan selesai"
E = "Mengeluh"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tryout_core::parser::{parse_package_str, validate_package};

    #[test]
    fn example_package_is_valid() {
        let file = parse_package_str(EXAMPLE_PACKAGE, Path::new("example.toml")).unwrap();
        assert_eq!(file.questions.len(), 3);
        assert!(validate_package(&file).is_empty());
    }
}
