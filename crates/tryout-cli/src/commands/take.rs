//! The `tryout take` command: an interactive, timed session on the terminal.
//!
//! Input is read line by line from stdin while a one-second interval drives
//! the countdown. Closing stdin leaves the session in progress.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Table};
use tokio::io::{AsyncBufReadExt, BufReader};

use tryout_core::countdown::format_clock;
use tryout_core::history::dashboard;
use tryout_core::model::AnswerChoice;
use tryout_core::session::{start_session, ActiveTryout, FinishMode, FinishOutcome, TickOutcome};
use tryout_core::TryoutError;

use super::packages::print_dashboard;
use super::App;

const HELP: &str = "Commands: a-e select, x clear, n next, p previous, g <number> go to, \
                    l list, f finish, q quit, h help";

/// Warn at these remaining-second marks.
const WARNINGS: [u64; 3] = [300, 60, 10];

enum Step {
    Continue,
    Done,
}

pub async fn execute(config: Option<&Path>, package_id: String) -> Result<()> {
    let app = App::load(config)?;
    let user = app.user()?.clone();

    let started = start_session(
        app.backend.store.clone(),
        &user,
        &package_id,
        app.config.session.clone(),
    )
    .await;
    let mut tryout = match started {
        Ok(tryout) => tryout,
        Err(e @ TryoutError::NotFound { .. }) => {
            println!("{}\n", e.notice());
            print_dashboard(&dashboard(app.store(), &user).await?);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "{}: {} questions, {}",
        tryout.package().title,
        tryout.questions().len(),
        format_clock(tryout.remaining_secs())
    );
    println!("{HELP}\n");
    show_question(&tryout);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut clock = tokio::time::interval(Duration::from_secs(1));
    clock.tick().await;
    let mut confirming = false;

    loop {
        tokio::select! {
            _ = clock.tick() => {
                match tryout.tick().await {
                    Ok(TickOutcome::Running(remaining)) => {
                        if WARNINGS.contains(&remaining) {
                            println!("{} remaining", format_clock(remaining));
                        }
                    }
                    Ok(TickOutcome::TimedOut(outcome)) => {
                        println!("\nTime is up.");
                        print_outcome(&outcome);
                        return Ok(());
                    }
                    Ok(TickOutcome::Stopped) => {}
                    Err(e) => println!("{} Type f to try finishing again.", e.notice()),
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    let settled = tryout.settle().await;
                    println!(
                        "\nInput closed. Session {} stays in progress ({} answers saved).",
                        tryout.session().id,
                        settled.completed
                    );
                    return Ok(());
                };
                if let Step::Done = handle(&mut tryout, line.trim(), &mut confirming).await? {
                    return Ok(());
                }
            }
        }
    }
}

async fn handle(tryout: &mut ActiveTryout, input: &str, confirming: &mut bool) -> Result<Step> {
    if std::mem::take(confirming) {
        if input.eq_ignore_ascii_case("y") {
            match tryout.finish(FinishMode::Manual).await {
                Ok(outcome) => {
                    print_outcome(&outcome);
                    return Ok(Step::Done);
                }
                Err(e) => println!("{}", e.notice()),
            }
        } else {
            println!("Continuing.");
        }
        return Ok(Step::Continue);
    }

    let mut parts = input.split_whitespace();
    let command = parts.next().unwrap_or_default().to_lowercase();
    match command.as_str() {
        "" => {}
        "a" | "b" | "c" | "d" | "e" => select(tryout, &command)?,
        "x" => {
            tryout.clear_answer()?;
            println!("Cleared question {}.", tryout.current_index() + 1);
        }
        "n" => {
            tryout.next();
            show_question(tryout);
        }
        "p" => {
            tryout.previous();
            show_question(tryout);
        }
        "g" => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
            Some(number) if number >= 1 => {
                tryout.goto(number - 1);
                show_question(tryout);
            }
            _ => println!("Usage: g <question number>"),
        },
        "l" => list_questions(tryout),
        "f" => {
            println!(
                "Finish now? {} of {} answered, {} left. [y/N]",
                tryout.answered_count(),
                tryout.questions().len(),
                format_clock(tryout.remaining_secs())
            );
            *confirming = true;
        }
        "q" => {
            let settled = tryout.settle().await;
            println!(
                "Session {} stays in progress ({} answers saved).",
                tryout.session().id,
                settled.completed
            );
            return Ok(Step::Done);
        }
        "h" | "?" => println!("{HELP}"),
        other => println!("Unknown command '{other}'. {HELP}"),
    }
    Ok(Step::Continue)
}

fn select(tryout: &mut ActiveTryout, command: &str) -> Result<()> {
    let choice: AnswerChoice = command.parse().map_err(anyhow::Error::msg)?;
    tryout.select_answer(choice)?;
    println!(
        "Question {}: {} selected ({}% answered)",
        tryout.current_index() + 1,
        choice,
        tryout.progress_percent()
    );
    Ok(())
}

fn show_question(tryout: &ActiveTryout) {
    let index = tryout.current_index();
    let question = tryout.current_question();
    let (main, sub) = question.category_pair();
    println!(
        "\nQuestion {}/{} [{main} / {sub}]  {}",
        index + 1,
        tryout.questions().len(),
        format_clock(tryout.remaining_secs())
    );
    println!("{}", question.question_text);
    let selected = tryout.selection(index);
    for choice in AnswerChoice::ALL {
        let marker = if selected == Some(choice) { '*' } else { ' ' };
        println!(" {marker} {choice}. {}", question.option(choice));
    }
}

fn list_questions(tryout: &ActiveTryout) {
    let current = tryout.current_index();
    let row: Vec<String> = (0..tryout.questions().len())
        .map(|i| {
            let answer = tryout
                .selection(i)
                .map_or("-".to_string(), |c| c.to_string());
            if i == current {
                format!("[{}:{answer}]", i + 1)
            } else {
                format!("{}:{answer}", i + 1)
            }
        })
        .collect();
    println!("{}", row.join(" "));
}

fn print_outcome(outcome: &FinishOutcome) {
    let done = match outcome {
        FinishOutcome::Completed(done) => done,
        FinishOutcome::AlreadyFinished => {
            println!("This tryout has already been finished.");
            return;
        }
    };

    let r = &done.results;
    println!(
        "\nScore: {} ({} correct, {} wrong, {} unanswered)",
        r.score, r.correct, r.wrong, r.unanswered
    );

    let mut table = Table::new();
    table.set_header(vec![
        "Category", "Sub-category", "Questions", "Correct", "Wrong", "Unanswered", "Accuracy",
        "Avg time",
    ]);
    for stats in &r.tag_stats {
        table.add_row(vec![
            Cell::new(&stats.main_category),
            Cell::new(&stats.sub_category),
            Cell::new(stats.total_questions),
            Cell::new(stats.correct_answers),
            Cell::new(stats.wrong_answers),
            Cell::new(stats.unanswered),
            Cell::new(format!("{}%", stats.accuracy_percent())),
            Cell::new(format!("{}s", stats.average_time_seconds)),
        ]);
    }
    println!("{table}");

    if done.failed_answer_writes > 0 {
        println!(
            "{} answer(s) could not be saved and were scored from the last saved value.",
            done.failed_answer_writes
        );
    }
    if done.tag_stats_failed > 0 {
        println!(
            "{} category breakdown row(s) could not be saved.",
            done.tag_stats_failed
        );
    }
    println!("Session: {}", done.session.id);
}
