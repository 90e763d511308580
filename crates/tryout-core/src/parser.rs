//! TOML package file parser.
//!
//! A package file holds one `[package]` table and any number of
//! `[[questions]]`. Files are checked with [`validate_package`] before import.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::admin::{PackageForm, QuestionForm};
use crate::model::AnswerChoice;

/// A parsed package file.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageFile {
    pub package: PackageForm,
    pub questions: Vec<QuestionForm>,
}

#[derive(Debug, Deserialize)]
struct TomlPackageFile {
    package: PackageForm,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    /// Defaults to the position in the file, counting from 1.
    #[serde(default)]
    number: Option<u32>,
    text: String,
    options: TomlOptions,
    answer: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    main_category: Option<String>,
    #[serde(default)]
    sub_category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlOptions {
    #[serde(rename = "A", alias = "a", default)]
    a: String,
    #[serde(rename = "B", alias = "b", default)]
    b: String,
    #[serde(rename = "C", alias = "c", default)]
    c: String,
    #[serde(rename = "D", alias = "d", default)]
    d: String,
    #[serde(rename = "E", alias = "e", default)]
    e: String,
}

/// Parse a single package file.
pub fn parse_package(path: &Path) -> Result<PackageFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read package file: {}", path.display()))?;

    parse_package_str(&content, path)
}

/// Parse package TOML from a string. `source_path` is only used in errors.
pub fn parse_package_str(content: &str, source_path: &Path) -> Result<PackageFile> {
    let parsed: TomlPackageFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .enumerate()
        .map(|(index, q)| QuestionForm {
            question_number: q.number.unwrap_or(index as u32 + 1),
            question_text: q.text,
            option_a: q.options.a,
            option_b: q.options.b,
            option_c: q.options.c,
            option_d: q.options.d,
            option_e: q.options.e,
            correct_answer: q.answer,
            explanation: q.explanation,
            main_category: q.main_category,
            sub_category: q.sub_category,
        })
        .collect();

    Ok(PackageFile {
        package: parsed.package,
        questions,
    })
}

/// Recursively load every `.toml` package file under `dir`.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_package_directory(dir: &Path) -> Result<Vec<(PathBuf, PackageFile)>> {
    let mut files = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            files.extend(load_package_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_package(&path) {
                Ok(file) => files.push((path, file)),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(files)
}

/// A problem found in a package file.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question concerned, if any.
    pub question_number: Option<u32>,
    pub message: String,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.question_number {
            Some(n) => write!(f, "question {n}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Check a package file for common mistakes.
pub fn validate_package(file: &PackageFile) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let package = &file.package;

    if package.title.trim().is_empty() {
        warnings.push(ValidationWarning {
            question_number: None,
            message: "package title is empty".into(),
        });
    }
    if package.duration_minutes == 0 {
        warnings.push(ValidationWarning {
            question_number: None,
            message: "duration_minutes is 0; sessions could never start".into(),
        });
    }
    if package.requires_payment && package.price == 0 {
        warnings.push(ValidationWarning {
            question_number: None,
            message: "package requires payment but its price is 0".into(),
        });
    }
    if file.questions.is_empty() {
        warnings.push(ValidationWarning {
            question_number: None,
            message: "package has no questions".into(),
        });
    }

    let mut seen = HashSet::new();
    for q in &file.questions {
        let number = Some(q.question_number);
        if q.question_number == 0 {
            warnings.push(ValidationWarning {
                question_number: number,
                message: "question number must be at least 1".into(),
            });
        }
        if !seen.insert(q.question_number) {
            warnings.push(ValidationWarning {
                question_number: number,
                message: format!("duplicate question number: {}", q.question_number),
            });
        }
        if q.question_text.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_number: number,
                message: "question text is empty".into(),
            });
        }
        for (label, text) in q.options() {
            if text.trim().is_empty() {
                warnings.push(ValidationWarning {
                    question_number: number,
                    message: format!("option {label} is empty"),
                });
            }
        }
        if q.correct_answer.parse::<AnswerChoice>().is_err() {
            warnings.push(ValidationWarning {
                question_number: number,
                message: format!("invalid correct answer '{}'", q.correct_answer),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_TOML: &str = r#"
[package]
title = "Tryout SKD CPNS #1"
description = "Simulasi SKD lengkap"
duration_minutes = 100
price = 25000

[[questions]]
text = "Sila pertama Pancasila adalah"
answer = "A"
main_category = "TWK"
sub_category = "Pancasila"
explanation = "Ketuhanan Yang Maha Esa"

[questions.options]
A = "Ketuhanan Yang Maha Esa"
B = "Kemanusiaan yang adil dan beradab"
C = "Persatuan Indonesia"
D = "Kerakyatan"
E = "Keadilan sosial"

[[questions]]
number = 5
text = "12 x 12 = ?"
answer = "c"
main_category = "TIU"

[questions.options]
a = "124"
b = "134"
c = "144"
d = "154"
e = "164"
"#;

    #[test]
    fn parse_valid_toml() {
        let file = parse_package_str(VALID_TOML, Path::new("skd.toml")).unwrap();
        assert_eq!(file.package.title, "Tryout SKD CPNS #1");
        assert_eq!(file.package.duration_minutes, 100);
        assert!(file.package.requires_payment);
        assert_eq!(file.questions.len(), 2);
        assert_eq!(file.questions[0].question_number, 1);
        assert_eq!(file.questions[1].question_number, 5);
        assert_eq!(file.questions[1].option_c, "144");
        assert_eq!(file.questions[0].sub_category.as_deref(), Some("Pancasila"));
        assert!(validate_package(&file).is_empty());
    }

    #[test]
    fn parse_minimal_package_uses_defaults() {
        let toml = r#"
[package]
title = "Minimal"
"#;
        let file = parse_package_str(toml, Path::new("min.toml")).unwrap();
        assert_eq!(file.package.duration_minutes, 110);
        assert!(file.package.is_active);
        let warnings = validate_package(&file);
        assert!(warnings.iter().any(|w| w.message.contains("no questions")));
        assert!(warnings.iter().any(|w| w.message.contains("price is 0")));
    }

    #[test]
    fn validate_flags_question_problems() {
        let toml = r#"
[package]
title = "Broken"
duration_minutes = 0
requires_payment = false

[[questions]]
number = 1
text = ""
answer = "F"
[questions.options]
A = "x"
B = "y"
C = "z"
D = "w"

[[questions]]
number = 1
text = "ok"
answer = "A"
[questions.options]
A = "x"
B = "y"
C = "z"
D = "w"
E = "v"
"#;
        let file = parse_package_str(toml, Path::new("broken.toml")).unwrap();
        let messages: Vec<String> = validate_package(&file)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert!(messages.iter().any(|m| m.contains("duration_minutes is 0")));
        assert!(messages.iter().any(|m| m == "question 1: question text is empty"));
        assert!(messages.iter().any(|m| m.contains("option E is empty")));
        assert!(messages.iter().any(|m| m.contains("invalid correct answer 'F'")));
        assert!(messages.iter().any(|m| m.contains("duplicate question number: 1")));
    }

    #[test]
    fn parse_malformed_toml() {
        let result = parse_package_str("[package\ntitle = ", Path::new("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_directory_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("bad.toml"), "not = [toml").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("more.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = load_package_directory(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(load_package_directory(&dir.path().join("good.toml")).is_err());
    }
}
