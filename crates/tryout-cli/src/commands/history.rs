//! The `tryout history` command.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Table};

use tryout_core::history::{session_details, session_tag_stats, user_history};
use tryout_core::model::percent;

use super::packages::session_table;
use super::{format_time, App};

pub async fn execute(config: Option<&Path>, session: Option<String>) -> Result<()> {
    let app = App::load(config)?;
    let user = app.user()?;

    if let Some(session_id) = session {
        return show_session(&app, &session_id).await;
    }

    let history = user_history(app.store(), user).await?;
    if history.entries.is_empty() {
        println!("No tryouts taken yet.");
        return Ok(());
    }

    let titles: HashMap<&str, &str> = history
        .entries
        .iter()
        .filter_map(|e| Some((e.session.id.as_str(), e.package_title.as_deref()?)))
        .collect();
    let table = session_table(history.entries.iter().map(|e| &e.session), |s| {
        titles.get(s.id.as_str()).map(|t| t.to_string())
    });
    println!("{table}");

    if let Some(summary) = history.summary {
        println!(
            "\n{} completed, average {}, best {}, accuracy {}%",
            summary.completed_sessions,
            summary.average_score,
            summary.highest_score,
            summary.accuracy_percent
        );
    }
    Ok(())
}

async fn show_session(app: &App, session_id: &str) -> Result<()> {
    let user = app.user()?;
    let details = session_details(app.store(), user, session_id).await?;
    let s = &details.session;

    println!("Session:  {}", s.id);
    println!("Package:  {}", s.package_id);
    println!("Started:  {}", format_time(Some(s.start_time)));
    println!("Finished: {}", format_time(s.end_time));
    println!("Status:   {}", s.status);
    if s.is_completed() {
        println!(
            "Score:    {} ({} correct, {} wrong, {} unanswered)",
            s.total_score.unwrap_or(0),
            s.correct_answers.unwrap_or(0),
            s.wrong_answers.unwrap_or(0),
            s.unanswered.unwrap_or(0)
        );
    } else {
        println!("Answers:  {} recorded", details.answers.len());
        return Ok(());
    }

    let stats = session_tag_stats(app.store(), user, session_id).await?;
    if stats.is_empty() {
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["Category", "Sub-category", "Correct", "Accuracy", "Avg time"]);
    for row in &stats {
        table.add_row(vec![
            Cell::new(&row.main_category),
            Cell::new(&row.sub_category),
            Cell::new(format!("{}/{}", row.correct_answers, row.total_questions)),
            Cell::new(format!("{}%", percent(row.correct_answers, row.total_questions))),
            Cell::new(format!("{}s", row.average_time_seconds)),
        ]);
    }
    println!("\n{table}");
    Ok(())
}
