//! Domain service for competition scoring.
//!
//! Weekly points for one entry, the weekly leaderboard and the monthly
//! leaderboard. Leaderboards fan out one upstream lookup per approved user;
//! a failed lookup becomes an [`EntryOutcome::Failed`] and never fails the batch.

use serde::Serialize;
use thiserror::Error;

use crate::clients::fpl::UpstreamError;
use crate::domain::{EntryId, Gameweek};

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Invalid month: {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for ScoringError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ScoringError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct WeeklyPoints {
    pub event_id: Gameweek,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LeaderboardRow {
    pub user_id: i32,
    pub name: String,
    pub company: Option<String>,
    pub entry_id: EntryId,
    pub event_id: Gameweek,
    pub points: i64,
    pub rank: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct GameweekPoints {
    pub event_id: Gameweek,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthlyRow {
    pub user_id: i32,
    pub name: String,
    pub company: Option<String>,
    pub entry_id: EntryId,
    pub month_points: i64,
    pub season_total: i64,
    pub gw_wins: u32,
    pub per_gameweek: Vec<GameweekPoints>,
    pub rank: usize,
}

impl MonthlyRow {
    #[must_use]
    pub fn points_in(&self, event_id: Gameweek) -> i64 {
        self.per_gameweek
            .iter()
            .find(|gw| gw.event_id == event_id)
            .map_or(0, |gw| gw.points)
    }
}

/// A user whose upstream lookup failed during a fan-out.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FetchFailure {
    pub user_id: i32,
    pub name: String,
    pub entry_id: EntryId,
    pub reason: String,
}

/// Per-user result of a fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome<T> {
    Scored(T),
    Failed(FetchFailure),
}

impl<T> EntryOutcome<T> {
    /// Splits outcomes into scored rows and failures, keeping input order in both.
    #[must_use]
    pub fn partition(outcomes: Vec<Self>) -> (Vec<T>, Vec<FetchFailure>) {
        let mut scored = Vec::with_capacity(outcomes.len());
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome {
                Self::Scored(row) => scored.push(row),
                Self::Failed(failure) => failed.push(failure),
            }
        }
        (scored, failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyLeaderboard {
    /// Gameweek asked for; `None` means the current one.
    pub gameweek: Option<Gameweek>,
    /// Gameweek actually scored.
    pub event_id: Gameweek,
    pub rows: Vec<LeaderboardRow>,
    pub failures: Vec<FetchFailure>,
}

impl WeeklyLeaderboard {
    #[must_use]
    pub fn total_users(&self) -> usize {
        self.rows.len() + self.failures.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyLeaderboard {
    pub year: i32,
    pub month: u32,
    pub event_ids: Vec<Gameweek>,
    pub rows: Vec<MonthlyRow>,
    pub failures: Vec<FetchFailure>,
    pub winner: Option<MonthlyRow>,
}

#[async_trait::async_trait]
pub trait ScoringService: Send + Sync {
    /// Points of one entry in `gameweek`, or in the current gameweek when `None`.
    ///
    /// An entry with no row for the gameweek scores 0.
    async fn weekly_points(
        &self,
        entry_id: EntryId,
        gameweek: Option<Gameweek>,
    ) -> Result<WeeklyPoints, ScoringError>;

    /// Approved users ranked by points, ties by name.
    ///
    /// # Errors
    ///
    /// Fails when the current gameweek cannot be resolved. Per-user failures
    /// are reported in the result.
    async fn weekly_leaderboard(
        &self,
        gameweek: Option<Gameweek>,
    ) -> Result<WeeklyLeaderboard, ScoringError>;

    /// Approved users ranked by month points, season total, then gameweek wins.
    ///
    /// # Errors
    ///
    /// [`ScoringError::InvalidMonth`] when `month` is not 1-12. Upstream failure
    /// to list gameweeks fails the call; per-user failures do not.
    async fn monthly_leaderboard(
        &self,
        year: i32,
        month: u32,
    ) -> Result<MonthlyLeaderboard, ScoringError>;
}
