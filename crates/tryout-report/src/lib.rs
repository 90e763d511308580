//! tryout-report: self-contained HTML reports.
//!
//! Renders session reports, package rankings and package statistics as
//! single HTML files with all CSS/JS inlined.

pub mod html;

pub use html::{
    generate_ranking_html, generate_session_html, generate_statistics_html, write_html,
};
