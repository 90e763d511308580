//! The `tryout validate` command.

use std::path::{Path, PathBuf};

use anyhow::Result;

use tryout_core::parser::{load_package_directory, parse_package, validate_package, PackageFile};

/// Parse a package file, or every package file under a directory.
pub fn load_packages(path: &Path) -> Result<Vec<(PathBuf, PackageFile)>> {
    if path.is_dir() {
        load_package_directory(path)
    } else {
        Ok(vec![(path.to_path_buf(), parse_package(path)?)])
    }
}

pub fn execute(path: PathBuf) -> Result<()> {
    let files = load_packages(&path)?;
    let mut total_warnings = 0;

    for (file_path, file) in &files {
        println!(
            "Package: {} ({} questions) [{}]",
            file.package.title,
            file.questions.len(),
            file_path.display()
        );

        let warnings = validate_package(file);
        for w in &warnings {
            println!("  WARNING: {w}");
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All packages valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
