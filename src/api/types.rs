use serde::{Deserialize, Serialize};

use crate::domain::{EntryId, Gameweek};
use crate::services::{FetchFailure, LeaderboardRow, MonthlyRow};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Body of a 429 response.
#[derive(Debug, Serialize, Deserialize)]
pub struct RateLimitedBody {
    pub success: bool,
    pub error: String,
    pub message: String,
    /// Seconds until the client may retry.
    pub retry_after: u64,
}

impl RateLimitedBody {
    pub fn new(message: impl Into<String>, retry_after: u64) -> Self {
        Self {
            success: false,
            error: "Too many requests".to_string(),
            message: message.into(),
            retry_after,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedDto {
    pub id: i32,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct FetchWarning {
    pub user: String,
    pub entry_id: EntryId,
    pub error: String,
}

impl From<FetchFailure> for FetchWarning {
    fn from(failure: FetchFailure) -> Self {
        Self {
            user: failure.name,
            entry_id: failure.entry_id,
            error: failure.reason,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaderboardMeta {
    pub total_users: usize,
    pub successful_fetches: usize,
    pub failed_fetches: usize,
    /// Requested gameweek, or `"current"`.
    pub gameweek: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardRow>,
    pub meta: LeaderboardMeta,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<FetchWarning>,
}

#[derive(Debug, Serialize)]
pub struct MonthlyResponse {
    pub year: i32,
    pub month: u32,
    pub month_event_ids: Vec<Gameweek>,
    pub leaderboard: Vec<MonthlyRow>,
    pub winner: Option<MonthlyRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<FetchWarning>,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: String,
    pub database: ComponentHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<ComponentHealth>,
}
