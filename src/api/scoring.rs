use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::{
    parse_entry_id_param, parse_gameweek, parse_leaderboard_gameweek, parse_month, parse_year,
};
use super::{
    ApiError, ApiResponse, AppState, FetchWarning, LeaderboardMeta, LeaderboardResponse,
    MonthlyResponse,
};
use crate::services::WeeklyPoints;

#[derive(Debug, Deserialize)]
pub struct WeeklyQuery {
    #[serde(rename = "entryId", alias = "entry_id")]
    pub entry_id: Option<String>,
    pub gw: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub gw: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    pub year: Option<String>,
    pub month: Option<String>,
}

/// GET /fpl/weekly?entryId=&gw=
pub async fn weekly_points(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WeeklyQuery>,
) -> Result<Json<ApiResponse<WeeklyPoints>>, ApiError> {
    let entry_id = parse_entry_id_param(query.entry_id.as_deref())?;
    let gameweek = parse_gameweek(query.gw.as_deref(), None)?;

    let weekly = state.scoring().weekly_points(entry_id, gameweek).await?;
    Ok(Json(ApiResponse::success(weekly)))
}

/// GET /leaderboard?gw=
pub async fn weekly_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<ApiResponse<LeaderboardResponse>>, ApiError> {
    let gameweek = parse_leaderboard_gameweek(query.gw.as_deref())?;

    let board = state.scoring().weekly_leaderboard(gameweek).await?;

    let meta = LeaderboardMeta {
        total_users: board.total_users(),
        successful_fetches: board.rows.len(),
        failed_fetches: board.failures.len(),
        gameweek: gameweek.map_or_else(|| "current".to_string(), |gw| gw.to_string()),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    Ok(Json(ApiResponse::success(LeaderboardResponse {
        leaderboard: board.rows,
        meta,
        warnings: board.failures.into_iter().map(FetchWarning::from).collect(),
    })))
}

/// GET /monthly?year=&month=
pub async fn monthly_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonthlyQuery>,
) -> Result<Json<ApiResponse<MonthlyResponse>>, ApiError> {
    let year = parse_year(query.year.as_deref())?;
    let month = parse_month(query.month.as_deref())?;

    let board = state.scoring().monthly_leaderboard(year, month).await?;

    Ok(Json(ApiResponse::success(MonthlyResponse {
        year: board.year,
        month: board.month,
        month_event_ids: board.event_ids,
        leaderboard: board.rows,
        winner: board.winner,
        warnings: board.failures.into_iter().map(FetchWarning::from).collect(),
    })))
}
