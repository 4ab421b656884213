//! Scoring over the user store and the upstream API.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::fpl::FplApi;
use crate::db::{Store, User};
use crate::domain::{EntryId, Gameweek};
use crate::services::ranking::{rank_monthly, rank_weekly};
use crate::services::scoring_service::{
    EntryOutcome, FetchFailure, GameweekPoints, LeaderboardRow, MonthlyLeaderboard, MonthlyRow,
    ScoringError, ScoringService, WeeklyLeaderboard, WeeklyPoints,
};

pub struct FplScoringService {
    store: Store,
    fpl: Arc<dyn FplApi>,
}

impl FplScoringService {
    #[must_use]
    pub fn new(store: Store, fpl: Arc<dyn FplApi>) -> Self {
        Self { store, fpl }
    }

    async fn weekly_row(
        &self,
        user: &User,
        gameweek: Option<Gameweek>,
    ) -> EntryOutcome<LeaderboardRow> {
        match self.weekly_points(user.entry_id, gameweek).await {
            Ok(weekly) => EntryOutcome::Scored(LeaderboardRow {
                user_id: user.id,
                name: user.name.clone(),
                company: user.company.clone(),
                entry_id: user.entry_id,
                event_id: weekly.event_id,
                points: weekly.points,
                rank: 0,
            }),
            Err(e) => EntryOutcome::Failed(failure(user, &e)),
        }
    }

    async fn monthly_row(&self, user: &User, event_ids: &[Gameweek]) -> EntryOutcome<MonthlyRow> {
        match self.fpl.entry_history(user.entry_id).await {
            Ok(history) => {
                let per_gameweek: Vec<GameweekPoints> = event_ids
                    .iter()
                    .map(|&event_id| GameweekPoints {
                        event_id,
                        points: history.points_for(event_id),
                    })
                    .collect();

                EntryOutcome::Scored(MonthlyRow {
                    user_id: user.id,
                    name: user.name.clone(),
                    company: user.company.clone(),
                    entry_id: user.entry_id,
                    month_points: per_gameweek.iter().map(|gw| gw.points).sum(),
                    season_total: history.season_total(),
                    gw_wins: 0,
                    per_gameweek,
                    rank: 0,
                })
            }
            Err(e) => EntryOutcome::Failed(failure(user, &e)),
        }
    }
}

fn failure(user: &User, error: &impl std::fmt::Display) -> FetchFailure {
    warn!(
        user_id = user.id,
        entry_id = %user.entry_id,
        error = %error,
        "Failed to fetch points for user"
    );
    FetchFailure {
        user_id: user.id,
        name: user.name.clone(),
        entry_id: user.entry_id,
        reason: error.to_string(),
    }
}

/// First and last second of a calendar month in UTC.
pub fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let next = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()?;
    Some((start, next - Duration::seconds(1)))
}

#[async_trait]
impl ScoringService for FplScoringService {
    async fn weekly_points(
        &self,
        entry_id: EntryId,
        gameweek: Option<Gameweek>,
    ) -> Result<WeeklyPoints, ScoringError> {
        let event_id = async {
            match gameweek {
                Some(gw) => Ok(gw),
                None => self.fpl.current_event_id().await,
            }
        };
        let (event_id, history) = tokio::join!(event_id, self.fpl.entry_history(entry_id));

        let event_id = event_id?;
        let history = history?;

        Ok(WeeklyPoints {
            event_id,
            points: history.points_for(event_id),
        })
    }

    async fn weekly_leaderboard(
        &self,
        gameweek: Option<Gameweek>,
    ) -> Result<WeeklyLeaderboard, ScoringError> {
        let users = self.store.list_approved_users().await?;

        // Resolved before the fan-out so a cold cache costs one bootstrap fetch.
        let event_id = match gameweek {
            Some(gw) => gw,
            None => self.fpl.current_event_id().await?,
        };

        let outcomes =
            join_all(users.iter().map(|user| self.weekly_row(user, Some(event_id)))).await;
        let (rows, failures) = EntryOutcome::partition(outcomes);

        info!(
            gameweek = event_id,
            users = users.len(),
            failed = failures.len(),
            "Weekly leaderboard computed"
        );

        Ok(WeeklyLeaderboard {
            gameweek,
            event_id,
            rows: rank_weekly(rows),
            failures,
        })
    }

    async fn monthly_leaderboard(
        &self,
        year: i32,
        month: u32,
    ) -> Result<MonthlyLeaderboard, ScoringError> {
        let (start, end) =
            month_bounds(year, month).ok_or(ScoringError::InvalidMonth { year, month })?;

        let event_ids = self.fpl.gameweeks_in_range(start, end).await?;

        if event_ids.is_empty() {
            info!(year, month, "No gameweeks in month");
            return Ok(MonthlyLeaderboard {
                year,
                month,
                event_ids,
                rows: Vec::new(),
                failures: Vec::new(),
                winner: None,
            });
        }

        let users = self.store.list_approved_users().await?;

        let outcomes =
            join_all(users.iter().map(|user| self.monthly_row(user, &event_ids))).await;
        let (rows, failures) = EntryOutcome::partition(outcomes);

        let rows = rank_monthly(rows, &event_ids);
        let winner = rows.first().cloned();

        info!(
            year,
            month,
            gameweeks = ?event_ids,
            users = users.len(),
            failed = failures.len(),
            "Monthly leaderboard computed"
        );

        Ok(MonthlyLeaderboard {
            year,
            month,
            event_ids,
            rows,
            failures,
            winner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_cover_whole_month() {
        let (start, end) = month_bounds(2024, 2).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-02-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-02-29T23:59:59+00:00");

        let (_, end) = month_bounds(2024, 12).unwrap();
        assert_eq!(end.to_rfc3339(), "2024-12-31T23:59:59+00:00");

        assert!(month_bounds(2024, 13).is_none());
        assert!(month_bounds(2024, 0).is_none());
    }
}
