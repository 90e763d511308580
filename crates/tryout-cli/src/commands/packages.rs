//! The `tryout packages` command: the signed-in user's dashboard.

use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Table};

use tryout_core::history::{dashboard, Dashboard};
use tryout_core::model::TryoutSession;

use super::{format_price, format_time, App};

pub async fn execute(config: Option<&Path>) -> Result<()> {
    let app = App::load(config)?;
    let user = app.user()?;
    let dashboard = dashboard(app.store(), user).await?;

    println!("Welcome, {}.\n", user.full_name);
    print_dashboard(&dashboard);
    Ok(())
}

pub fn print_dashboard(dashboard: &Dashboard) {
    if dashboard.packages.is_empty() {
        println!("No packages available yet.");
    } else {
        let mut table = Table::new();
        table.set_header(vec!["ID", "Title", "Questions", "Duration", "Price", "Access"]);
        for listing in &dashboard.packages {
            let p = &listing.package;
            let access = if listing.has_access {
                "open"
            } else {
                "payment required"
            };
            table.add_row(vec![
                Cell::new(&p.id),
                Cell::new(&p.title),
                Cell::new(p.total_questions),
                Cell::new(format!("{} min", p.duration_minutes)),
                Cell::new(format_price(p.price)),
                Cell::new(access),
            ]);
        }
        println!("{table}");
    }

    if !dashboard.recent_sessions.is_empty() {
        println!(
            "\nRecent sessions ({} completed):",
            dashboard.completed_recent()
        );
        println!("{}", session_table(&dashboard.recent_sessions, |_| None));
    }
}

/// Sessions as a table, with the package column filled in by `title`.
pub fn session_table<'a>(
    sessions: impl IntoIterator<Item = &'a TryoutSession>,
    title: impl Fn(&TryoutSession) -> Option<String>,
) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Session", "Package", "Started", "Status", "Score"]);
    for s in sessions {
        let score = s
            .total_score
            .map_or("-".to_string(), |score| score.to_string());
        table.add_row(vec![
            Cell::new(&s.id),
            Cell::new(title(s).unwrap_or_else(|| s.package_id.clone())),
            Cell::new(format_time(Some(s.start_time))),
            Cell::new(s.status),
            Cell::new(score),
        ]);
    }
    table
}
