//! The `tryout report` command.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use comfy_table::{Cell, Table};

use tryout_core::report::SessionReport;
use tryout_report::{generate_session_html, write_html};

use super::{format_time, App};

pub async fn execute(
    config: Option<&Path>,
    session_id: String,
    format: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let app = App::load(config)?;
    let user = app.user()?;
    let report = SessionReport::build(app.store(), user, &session_id).await?;

    match format.as_str() {
        "json" => match &output {
            Some(path) => report.save_json(path)?,
            None => println!("{}", serde_json::to_string_pretty(&report)?),
        },
        "markdown" | "md" => emit(&report.to_markdown(), output.as_deref())?,
        "text" => emit(&to_text(&report), output.as_deref())?,
        "html" => {
            let Some(path) = &output else {
                bail!("--output is required for the html format");
            };
            write_html(&generate_session_html(&report), path)?;
        }
        other => bail!("unknown format: {other} (expected text, markdown, json or html)"),
    }

    if let Some(path) = output {
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, content)?,
        None => print!("{content}"),
    }
    Ok(())
}

fn to_text(report: &SessionReport) -> String {
    let s = &report.session;
    let mut out = String::new();
    out.push_str(&format!("{} ({})\n", report.package.title, report.participant));
    out.push_str(&format!(
        "Started {}, finished {}, {}\n",
        format_time(Some(s.start_time)),
        format_time(s.end_time),
        s.status
    ));
    if s.is_completed() {
        out.push_str(&format!(
            "Score: {} ({} correct, {} wrong, {} unanswered)\n",
            s.total_score.unwrap_or(0),
            s.correct_answers.unwrap_or(0),
            s.wrong_answers.unwrap_or(0),
            s.unanswered.unwrap_or(0)
        ));
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Category", "Answer", "Correct", "Result", "Time"]);
    for q in &report.review {
        let result = match (q.answer, q.is_correct) {
            (None, _) => "unanswered",
            (Some(_), true) => "correct",
            (Some(_), false) => "wrong",
        };
        table.add_row(vec![
            Cell::new(q.number),
            Cell::new(&q.category),
            Cell::new(q.answer.map_or("-".to_string(), |a| a.to_string())),
            Cell::new(q.correct_answer),
            Cell::new(result),
            Cell::new(format!("{}s", q.time_spent_seconds)),
        ]);
    }
    out.push_str(&format!("\n{table}\n"));
    out
}
