use serde_json::Value;

use super::ApiError;
use crate::domain::{EntryId, Gameweek, LAST_GAMEWEEK, UserStatus};

pub fn validate_name(name: &str) -> Result<String, ApiError> {
    let trimmed = name.trim();
    if trimmed.chars().count() < 2 {
        return Err(ApiError::validation(
            "Name must be at least 2 characters",
        ));
    }
    Ok(trimmed.to_string())
}

/// Accepts `local@domain.tld` shapes without whitespace.
pub fn validate_email(email: &str) -> Result<String, ApiError> {
    let trimmed = email.trim();
    let invalid = || ApiError::validation(format!("Invalid email address: '{trimmed}'"));

    if trimmed.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = trimmed.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    if host.is_empty() || tld.is_empty() || host.starts_with('.') {
        return Err(invalid());
    }

    Ok(trimmed.to_string())
}

/// Empty strings count as absent.
pub fn validate_company(company: Option<&str>) -> Option<String> {
    company
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Entry ids arrive as JSON numbers or numeric strings.
pub fn parse_entry_id(raw: Option<&Value>) -> Result<EntryId, ApiError> {
    let invalid = || ApiError::validation("entryId must be a positive integer");

    let id = match raw {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(invalid)?,
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    if id <= 0 {
        return Err(invalid());
    }
    Ok(EntryId::new(id))
}

pub fn parse_entry_id_param(raw: Option<&str>) -> Result<EntryId, ApiError> {
    parse_entry_id(raw.map(|s| Value::String(s.to_string())).as_ref())
}

/// Optional positive gameweek. `max` bounds it when given.
pub fn parse_gameweek(raw: Option<&str>, max: Option<Gameweek>) -> Result<Option<Gameweek>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let upper = max.unwrap_or(Gameweek::MAX);
    match raw.parse::<Gameweek>() {
        Ok(gw) if gw >= 1 && gw <= upper => Ok(Some(gw)),
        _ if max.is_some() => Err(ApiError::validation(format!(
            "Invalid gameweek: {raw}. Gameweek must be between 1 and {upper}"
        ))),
        _ => Err(ApiError::validation(format!(
            "Invalid gameweek: {raw}. Gameweek must be a positive integer"
        ))),
    }
}

pub fn parse_leaderboard_gameweek(raw: Option<&str>) -> Result<Option<Gameweek>, ApiError> {
    parse_gameweek(raw, Some(LAST_GAMEWEEK))
}

pub fn parse_year(raw: Option<&str>) -> Result<i32, ApiError> {
    const MIN_YEAR: i32 = 2000;
    const MAX_YEAR: i32 = 2100;

    match raw.map(str::trim).map(str::parse::<i32>) {
        Some(Ok(year)) if (MIN_YEAR..=MAX_YEAR).contains(&year) => Ok(year),
        _ => Err(ApiError::validation(format!(
            "year must be an integer between {MIN_YEAR} and {MAX_YEAR}"
        ))),
    }
}

pub fn parse_month(raw: Option<&str>) -> Result<u32, ApiError> {
    match raw.map(str::trim).map(str::parse::<u32>) {
        Some(Ok(month)) if (1..=12).contains(&month) => Ok(month),
        _ => Err(ApiError::validation(
            "month must be an integer between 1 and 12",
        )),
    }
}

pub fn parse_status_filter(raw: Option<&str>) -> Result<Option<UserStatus>, ApiError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<UserStatus>().map_err(ApiError::validation))
        .transpose()
}

/// Admins may only approve or block.
pub fn parse_status_change(raw: &str) -> Result<UserStatus, ApiError> {
    match raw.parse::<UserStatus>() {
        Ok(status @ (UserStatus::Approved | UserStatus::Blocked)) => Ok(status),
        _ => Err(ApiError::validation(
            "status must be APPROVED or BLOCKED",
        )),
    }
}
