//! HTML report generator.
//!
//! Produces self-contained HTML files with all CSS/JS inlined.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use tryout_core::history::{PackageStatistics, RankingEntry};
use tryout_core::report::SessionReport;
use tryout_core::scoring::{score_band, TagStatsDraft};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn open_document(html: &mut String, title: &str) {
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!("<title>{}</title>\n", html_escape(title)));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");
}

fn close_document(html: &mut String) {
    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");
    html.push_str("</body>\n</html>");
}

/// Generate the HTML page for one session report.
pub fn generate_session_html(report: &SessionReport) -> String {
    let mut html = String::new();
    let session = &report.session;
    open_document(&mut html, &format!("Tryout result: {}", report.package.title));

    html.push_str("<header>\n");
    html.push_str(&format!("<h1>{}</h1>\n", html_escape(&report.package.title)));
    html.push_str(&format!(
        "<p class=\"meta\">Participant: <strong>{}</strong> | {} questions | {} minutes | started {}</p>\n",
        html_escape(&report.participant),
        report.package.question_count,
        report.package.duration_minutes,
        session.start_time.format("%Y-%m-%d %H:%M UTC")
    ));
    html.push_str("</header>\n");

    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    if session.is_completed() {
        let score = session.total_score.unwrap_or(0);
        html.push_str(&format!(
            "<p class=\"score {}\">{}</p>\n",
            score_band(score),
            score
        ));
        html.push_str("<table class=\"summary\">\n");
        html.push_str("<thead><tr><th>Correct</th><th>Wrong</th><th>Unanswered</th><th>Finished</th></tr></thead>\n");
        html.push_str(&format!(
            "<tbody><tr><td class=\"pass\">{}</td><td class=\"fail\">{}</td><td>{}</td><td>{}</td></tr></tbody>\n",
            session.correct_answers.unwrap_or(0),
            session.wrong_answers.unwrap_or(0),
            session.unanswered.unwrap_or(0),
            session
                .end_time
                .map_or("-".to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        ));
        html.push_str("</table>\n");
    } else {
        html.push_str("<p class=\"meta\">This session is still in progress.</p>\n");
    }
    html.push_str("</section>\n");

    if !report.tag_stats.is_empty() {
        html.push_str("<section class=\"categories\">\n");
        html.push_str("<h2>Categories</h2>\n");
        html.push_str(&generate_accuracy_chart(&report.tag_stats));
        html.push_str("<table>\n");
        html.push_str("<thead><tr><th>Category</th><th>Sub category</th><th>Questions</th><th>Correct</th><th>Wrong</th><th>Blank</th><th>Accuracy</th><th>Avg time</th></tr></thead>\n");
        html.push_str("<tbody>\n");
        for t in &report.tag_stats {
            let accuracy = t.accuracy_percent();
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"{}\">{}%</td><td>{}s</td></tr>\n",
                html_escape(&t.main_category),
                html_escape(&t.sub_category),
                t.total_questions,
                t.correct_answers,
                t.wrong_answers,
                t.unanswered,
                score_band(accuracy),
                accuracy,
                t.average_time_seconds
            ));
        }
        html.push_str("</tbody></table>\n");
        html.push_str("</section>\n");
    }

    html.push_str("<section class=\"review\">\n");
    html.push_str("<h2>Review</h2>\n");
    html.push_str("<table class=\"sortable\" id=\"review\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable('review', 0)\">#</th><th onclick=\"sortTable('review', 1)\">Category</th><th>Question</th><th onclick=\"sortTable('review', 3)\">Your answer</th><th>Correct answer</th><th onclick=\"sortTable('review', 5)\">Time</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for r in &report.review {
        let class = match (r.answer, r.is_correct) {
            (None, _) => "blank",
            (Some(_), true) => "pass",
            (Some(_), false) => "fail",
        };
        let mut question = html_escape(&r.text);
        if !r.explanation.is_empty() {
            question.push_str(&format!(
                "<details><summary>Explanation</summary>{}</details>",
                html_escape(&r.explanation)
            ));
        }
        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}. {}</td><td>{}s</td></tr>\n",
            class,
            r.number,
            html_escape(&r.category),
            question,
            r.answer.map_or("-".to_string(), |a| a.to_string()),
            r.correct_answer,
            html_escape(&r.correct_text),
            r.time_spent_seconds
        ));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    close_document(&mut html);
    html
}

fn push_ranking_table(html: &mut String, entries: &[RankingEntry]) {
    if entries.is_empty() {
        html.push_str("<p class=\"meta\">No completed sessions yet.</p>\n");
        return;
    }
    html.push_str("<table class=\"sortable\" id=\"ranking\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable('ranking', 0)\">Rank</th><th onclick=\"sortTable('ranking', 1)\">Participant</th><th onclick=\"sortTable('ranking', 2)\">Score</th><th>Correct</th><th>Wrong</th><th>Unanswered</th><th>Finished</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for entry in entries {
        let s = &entry.session;
        let score = s.total_score.unwrap_or(0);
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            entry.rank,
            html_escape(&entry.user_name),
            score_band(score),
            score,
            s.correct_answers.unwrap_or(0),
            s.wrong_answers.unwrap_or(0),
            s.unanswered.unwrap_or(0),
            s.end_time
                .map_or("-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
        ));
    }
    html.push_str("</tbody></table>\n");
}

/// Generate the leaderboard page of a package.
pub fn generate_ranking_html(
    package_title: &str,
    entries: &[RankingEntry],
    generated_at: DateTime<Utc>,
) -> String {
    let mut html = String::new();
    open_document(&mut html, &format!("Ranking: {package_title}"));

    html.push_str("<header>\n");
    html.push_str(&format!("<h1>Ranking: {}</h1>\n", html_escape(package_title)));
    html.push_str(&format!(
        "<p class=\"meta\">Top {} | generated {}</p>\n",
        entries.len(),
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    html.push_str("<section class=\"results\">\n");
    push_ranking_table(&mut html, entries);
    html.push_str("</section>\n");

    close_document(&mut html);
    html
}

/// Generate the administrator overview of a package.
pub fn generate_statistics_html(stats: &PackageStatistics, generated_at: DateTime<Utc>) -> String {
    let mut html = String::new();
    let package = &stats.package;
    open_document(&mut html, &format!("Statistics: {}", package.title));

    html.push_str("<header>\n");
    html.push_str(&format!("<h1>{}</h1>\n", html_escape(&package.title)));
    html.push_str(&format!(
        "<p class=\"meta\">{} questions | {} minutes | price {} | generated {}</p>\n",
        package.total_questions,
        package.duration_minutes,
        package.price,
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Completed payments</th><th>Revenue</th><th>Completed sessions</th><th>Participants</th><th>Average score</th><th>Highest score</th></tr></thead>\n");
    html.push_str(&format!(
        "<tbody><tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{}</td></tr></tbody>\n",
        stats.completed_payments,
        stats.revenue,
        stats.scores.completed_sessions,
        stats.scores.participants,
        score_band(stats.scores.average_score),
        stats.scores.average_score,
        stats.scores.highest_score
    ));
    html.push_str("</table>\n");
    html.push_str("</section>\n");

    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Leaderboard</h2>\n");
    push_ranking_table(&mut html, &stats.leaderboard);
    html.push_str("</section>\n");

    close_document(&mut html);
    html
}

/// Write an HTML page to a file.
pub fn write_html(html: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

fn generate_accuracy_chart(tag_stats: &[TagStatsDraft]) -> String {
    let bar_height = 24;
    let max_width = 400;
    let padding = 8;
    let label_width = 260;

    let total_height = tag_stats.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, t) in tag_stats.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let accuracy = t.accuracy_percent();
        let width = accuracy as usize * max_width / 100;

        let color = match score_band(accuracy) {
            "good" => "#22c55e",
            "fair" => "#eab308",
            _ => "#ef4444",
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"13\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{} / {}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(&t.main_category),
            html_escape(&t.sub_category)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{}%</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            accuracy
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --muted: #6b7280; --border: #e5e7eb; --good: #dcfce7; --fair: #fef9c3; --poor: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --good: #064e3b; --fair: #713f12; --poor: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: var(--muted); }
.score { font-size: 3rem; font-weight: bold; display: inline-block; padding: 0.25rem 1.5rem; border-radius: 8px; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; vertical-align: top; }
th { background: var(--border); }
table.sortable th[onclick] { cursor: pointer; }
.good, .pass { background: var(--good); }
.fair { background: var(--fair); }
.poor, .fail { background: var(--poor); }
.blank td:nth-child(4) { color: var(--muted); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 0.5rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(id, col) {
  const table = document.getElementById(id);
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    const na = parseFloat(va), nb = parseFloat(vb);
    const cmp = !isNaN(na) && !isNaN(nb) ? na - nb : va.localeCompare(vb);
    return asc ? cmp : -cmp;
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tryout_core::model::{AnswerChoice, QuestionPackage, SessionStatus, TryoutSession};
    use tryout_core::report::{PackageSummary, QuestionReview};
    use tryout_core::scoring::PackageScoreSummary;

    fn session(score: u32, user: &str) -> TryoutSession {
        TryoutSession {
            id: format!("s-{user}"),
            user_id: user.into(),
            package_id: "pkg-1".into(),
            start_time: Utc::now(),
            end_time: Some(Utc::now()),
            status: SessionStatus::Completed,
            total_score: Some(score),
            correct_answers: Some(3),
            wrong_answers: Some(1),
            unanswered: Some(1),
            created_at: None,
            updated_at: None,
        }
    }

    fn make_report() -> SessionReport {
        SessionReport {
            id: uuid::Uuid::nil(),
            created_at: Utc::now(),
            participant: "Rina <script>".into(),
            package: PackageSummary {
                id: "pkg-1".into(),
                title: "SKD & TIU".into(),
                duration_minutes: 100,
                question_count: 2,
            },
            session: session(60, "u1"),
            tag_stats: vec![TagStatsDraft {
                main_category: "TIU".into(),
                sub_category: "Aritmatika".into(),
                total_questions: 2,
                correct_answers: 1,
                wrong_answers: 0,
                unanswered: 1,
                total_time_seconds: 40,
                average_time_seconds: 20,
            }],
            review: vec![
                QuestionReview {
                    number: 1,
                    text: "2 + 2 = ?".into(),
                    category: "TIU / Aritmatika".into(),
                    answer: Some(AnswerChoice::B),
                    correct_answer: AnswerChoice::B,
                    correct_text: "4".into(),
                    is_correct: true,
                    time_spent_seconds: 40,
                    explanation: "basic addition".into(),
                },
                QuestionReview {
                    number: 2,
                    text: "3 x 3 = ?".into(),
                    category: "TIU / Aritmatika".into(),
                    answer: None,
                    correct_answer: AnswerChoice::D,
                    correct_text: "9".into(),
                    is_correct: false,
                    time_spent_seconds: 0,
                    explanation: String::new(),
                },
            ],
        }
    }

    #[test]
    fn session_html_contains_required_elements() {
        let html = generate_session_html(&make_report());

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("SKD &amp; TIU"));
        assert!(html.contains("Rina &lt;script&gt;"));
        assert!(!html.contains("Rina <script>"));
        assert!(html.contains("<p class=\"score fair\">60</p>"));
        assert!(html.contains("<svg"));
        assert!(html.contains("TIU / Aritmatika"));
        assert!(html.contains("basic addition"));
        assert!(html.contains("<tr class=\"blank\">"));
    }

    #[test]
    fn in_progress_session_has_no_score() {
        let mut report = make_report();
        report.session.status = SessionStatus::InProgress;
        let html = generate_session_html(&report);
        assert!(html.contains("still in progress"));
        assert!(!html.contains("class=\"score"));
    }

    #[test]
    fn ranking_html_lists_entries_in_order() {
        let entries = vec![
            RankingEntry {
                rank: 1,
                user_name: "Budi".into(),
                session: session(90, "u2"),
            },
            RankingEntry {
                rank: 2,
                user_name: "Unknown".into(),
                session: session(40, "u3"),
            },
        ];
        let html = generate_ranking_html("SKD #1", &entries, Utc::now());
        let budi = html.find("Budi").unwrap();
        let unknown = html.find("Unknown").unwrap();
        assert!(budi < unknown);
        assert!(html.contains("<td class=\"good\">90</td>"));
        assert!(html.contains("<td class=\"poor\">40</td>"));

        let empty = generate_ranking_html("SKD #1", &[], Utc::now());
        assert!(empty.contains("No completed sessions yet."));
    }

    #[test]
    fn statistics_html_shows_revenue() {
        let stats = PackageStatistics {
            package: QuestionPackage {
                id: "pkg-1".into(),
                title: "SKD #1".into(),
                description: String::new(),
                duration_minutes: 100,
                price: 25000,
                requires_payment: true,
                is_active: true,
                total_questions: 110,
                created_at: None,
                updated_at: None,
            },
            completed_payments: 2,
            revenue: 50000,
            scores: PackageScoreSummary {
                completed_sessions: 3,
                participants: 2,
                average_score: 70,
                highest_score: 90,
            },
            leaderboard: vec![],
        };
        let html = generate_statistics_html(&stats, Utc::now());
        assert!(html.contains("<td>50000</td>"));
        assert!(html.contains("<td class=\"fair\">70</td>"));
    }

    #[test]
    fn html_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.html");

        write_html(&generate_session_html(&make_report()), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }
}
