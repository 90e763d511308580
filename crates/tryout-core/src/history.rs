//! Dashboard, history, rankings and per-package statistics.

use std::collections::HashMap;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::ensure_admin;
use crate::error::{Result, TryoutError};
use crate::model::{
    Payment, PaymentStatus, QuestionPackage, QuestionTagStats, SessionStatus, TryoutSession,
    User, UserAnswer,
};
use crate::payment::{completed_payments, has_access};
use crate::repo::repo;
use crate::scoring::{history_summary, package_score_summary, HistorySummary, PackageScoreSummary};
use crate::traits::{AuthProvider, EntityStore, OrderSpec, Query};

pub const DASHBOARD_PACKAGE_LIMIT: usize = 10;
pub const RECENT_SESSION_LIMIT: usize = 5;
pub const HISTORY_LIMIT: usize = 50;
pub const RANKING_LIMIT: usize = 5;
pub const STATISTICS_SESSION_LIMIT: usize = 50;

/// Name shown for participants whose account cannot be loaded.
pub const UNKNOWN_USER: &str = "Unknown";

/// An active package as seen by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageListing {
    pub package: QuestionPackage,
    pub has_access: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub packages: Vec<PackageListing>,
    pub recent_sessions: Vec<TryoutSession>,
}

impl Dashboard {
    pub fn completed_recent(&self) -> usize {
        self.recent_sessions.iter().filter(|s| s.is_completed()).count()
    }
}

pub async fn dashboard(store: &dyn EntityStore, user: &User) -> Result<Dashboard> {
    let packages = repo::<QuestionPackage>(store)
        .filter(
            &Query::new()
                .eq("is_active", true)
                .order_by(OrderSpec::desc("created_at"))
                .limit(DASHBOARD_PACKAGE_LIMIT),
        )
        .await?;
    let recent_sessions = user_sessions(store, user, RECENT_SESSION_LIMIT).await?;
    let payments = completed_payments(store, user).await?;

    let packages = packages
        .into_iter()
        .map(|package| PackageListing {
            has_access: has_access(&package, &user.id, &payments),
            package,
        })
        .collect();
    Ok(Dashboard {
        packages,
        recent_sessions,
    })
}

async fn user_sessions(store: &dyn EntityStore, user: &User, limit: usize) -> Result<Vec<TryoutSession>> {
    repo::<TryoutSession>(store)
        .filter(
            &Query::new()
                .eq("user_id", user.id.as_str())
                .order_by(OrderSpec::desc("created_at"))
                .limit(limit),
        )
        .await
}

/// One session in the history list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub session: TryoutSession,
    /// `None` when the package has since been deleted.
    pub package_title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    pub entries: Vec<HistoryEntry>,
    pub summary: Option<HistorySummary>,
}

pub async fn user_history(store: &dyn EntityStore, user: &User) -> Result<History> {
    let sessions = user_sessions(store, user, HISTORY_LIMIT).await?;
    let summary = history_summary(&sessions);

    let mut titles: HashMap<String, Option<String>> = HashMap::new();
    for session in &sessions {
        if titles.contains_key(&session.package_id) {
            continue;
        }
        let title = match repo::<QuestionPackage>(store).get(&session.package_id).await {
            Ok(package) => Some(package.title),
            Err(TryoutError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        titles.insert(session.package_id.clone(), title);
    }

    let entries = sessions
        .into_iter()
        .map(|session| HistoryEntry {
            package_title: titles.get(&session.package_id).cloned().flatten(),
            session,
        })
        .collect();
    Ok(History { entries, summary })
}

/// Load a session the user may see: their own, or any session for an admin.
pub async fn load_session(
    store: &dyn EntityStore,
    user: &User,
    session_id: &str,
) -> Result<TryoutSession> {
    let session = repo::<TryoutSession>(store).get(session_id).await?;
    if session.user_id != user.id && !user.is_admin {
        return Err(TryoutError::AccessDenied(format!(
            "session {session_id} belongs to another user"
        )));
    }
    Ok(session)
}

/// A session with its recorded answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetails {
    pub session: TryoutSession,
    pub answers: Vec<UserAnswer>,
}

pub async fn session_details(
    store: &dyn EntityStore,
    user: &User,
    session_id: &str,
) -> Result<SessionDetails> {
    let session = load_session(store, user, session_id).await?;
    let answers = repo::<UserAnswer>(store)
        .filter(&Query::new().eq("session_id", session_id))
        .await?;
    Ok(SessionDetails { session, answers })
}

pub async fn session_tag_stats(
    store: &dyn EntityStore,
    user: &User,
    session_id: &str,
) -> Result<Vec<QuestionTagStats>> {
    load_session(store, user, session_id).await?;
    repo::<QuestionTagStats>(store)
        .filter(&Query::new().eq("session_id", session_id))
        .await
}

/// One row of a package leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    /// 1-based position.
    pub rank: usize,
    pub user_name: String,
    pub session: TryoutSession,
}

async fn completed_sessions(
    store: &dyn EntityStore,
    package_id: &str,
    limit: usize,
) -> Result<Vec<TryoutSession>> {
    repo::<TryoutSession>(store)
        .filter(
            &Query::new()
                .eq("package_id", package_id)
                .eq("status", SessionStatus::Completed.to_string())
                .order_by(OrderSpec::desc("total_score"))
                .limit(limit),
        )
        .await
}

async fn rank(auth: &dyn AuthProvider, sessions: Vec<TryoutSession>) -> Vec<RankingEntry> {
    let mut user_ids: Vec<&str> = sessions.iter().map(|s| s.user_id.as_str()).collect();
    user_ids.sort_unstable();
    user_ids.dedup();

    let lookups = join_all(user_ids.iter().map(|id| auth.get_user(id))).await;
    let names: HashMap<String, String> = user_ids
        .iter()
        .zip(lookups)
        .map(|(id, lookup)| {
            let name = match lookup {
                Ok(user) => user.full_name,
                Err(e) => {
                    warn!(user = %id, "could not load participant: {e}");
                    UNKNOWN_USER.to_string()
                }
            };
            (id.to_string(), name)
        })
        .collect();

    sessions
        .into_iter()
        .enumerate()
        .map(|(index, session)| RankingEntry {
            rank: index + 1,
            user_name: names
                .get(&session.user_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_USER.to_string()),
            session,
        })
        .collect()
}

/// Top completed sessions of a package by score.
pub async fn ranking(
    store: &dyn EntityStore,
    auth: &dyn AuthProvider,
    package_id: &str,
    limit: usize,
) -> Result<Vec<RankingEntry>> {
    let sessions = completed_sessions(store, package_id, limit).await?;
    Ok(rank(auth, sessions).await)
}

/// Payment and score overview of one package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageStatistics {
    pub package: QuestionPackage,
    pub completed_payments: usize,
    pub revenue: u64,
    pub scores: PackageScoreSummary,
    pub leaderboard: Vec<RankingEntry>,
}

pub async fn package_statistics(
    store: &dyn EntityStore,
    auth: &dyn AuthProvider,
    admin: &User,
    package_id: &str,
) -> Result<PackageStatistics> {
    ensure_admin(admin)?;
    let package = repo::<QuestionPackage>(store).get(package_id).await?;
    let payments = repo::<Payment>(store)
        .filter(
            &Query::new()
                .eq("package_id", package_id)
                .eq("status", PaymentStatus::Completed.to_string()),
        )
        .await?;
    let sessions = completed_sessions(store, package_id, STATISTICS_SESSION_LIMIT).await?;
    let scores = package_score_summary(&sessions);

    Ok(PackageStatistics {
        package,
        completed_payments: payments.len(),
        revenue: payments.iter().map(|p| p.amount).sum(),
        scores,
        leaderboard: rank(auth, sessions).await,
    })
}
