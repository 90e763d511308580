//! The `tryout ranking` and `tryout stats` commands.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use comfy_table::{Cell, Table};

use tryout_core::history::{package_statistics, ranking as package_ranking, RankingEntry};
use tryout_core::model::QuestionPackage;
use tryout_core::repo::repo;
use tryout_report::{generate_ranking_html, generate_statistics_html, write_html};

use super::{format_price, format_rupiah, format_time, App};

pub async fn ranking(
    config: Option<&Path>,
    package_id: String,
    limit: usize,
    html: Option<PathBuf>,
) -> Result<()> {
    let app = App::load(config)?;
    app.user()?;
    let package = repo::<QuestionPackage>(app.store()).get(&package_id).await?;
    let entries = package_ranking(
        app.store(),
        app.backend.auth.as_ref(),
        &package_id,
        limit,
    )
    .await?;

    println!("Ranking: {}\n", package.title);
    print_leaderboard(&entries);

    if let Some(path) = html {
        write_html(&generate_ranking_html(&package.title, &entries, Utc::now()), &path)?;
        println!("\nHTML ranking written to {}", path.display());
    }
    Ok(())
}

pub async fn stats(config: Option<&Path>, package_id: String, html: Option<PathBuf>) -> Result<()> {
    let app = App::load(config)?;
    let admin = app.admin()?;
    let stats = package_statistics(
        app.store(),
        app.backend.auth.as_ref(),
        admin,
        &package_id,
    )
    .await?;

    let s = &stats.scores;
    println!("Package:           {}", stats.package.title);
    println!("Price:             {}", format_price(stats.package.price));
    println!("Payments:          {}", stats.completed_payments);
    println!("Revenue:           {}", format_rupiah(stats.revenue));
    println!("Sessions:          {}", s.completed_sessions);
    println!("Participants:      {}", s.participants);
    println!("Average score:     {}", s.average_score);
    println!("Highest score:     {}\n", s.highest_score);
    print_leaderboard(&stats.leaderboard);

    if let Some(path) = html {
        write_html(&generate_statistics_html(&stats, Utc::now()), &path)?;
        println!("\nHTML statistics written to {}", path.display());
    }
    Ok(())
}

fn print_leaderboard(entries: &[RankingEntry]) {
    if entries.is_empty() {
        println!("No completed sessions yet.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["#", "Participant", "Score", "Correct", "Finished"]);
    for entry in entries {
        let s = &entry.session;
        table.add_row(vec![
            Cell::new(entry.rank),
            Cell::new(&entry.user_name),
            Cell::new(s.total_score.unwrap_or(0)),
            Cell::new(s.correct_answers.unwrap_or(0)),
            Cell::new(format_time(s.end_time)),
        ]);
    }
    println!("{table}");
}
