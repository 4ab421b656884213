//! Ordering and ranking of leaderboard rows.
//!
//! All sorts are stable, so rows that tie on every key keep their input order.

use std::cmp::Reverse;

use crate::domain::Gameweek;
use crate::services::scoring_service::{LeaderboardRow, MonthlyRow};

/// Sorts by points descending, then name, and assigns 1-based ranks.
#[must_use]
pub fn rank_weekly(mut rows: Vec<LeaderboardRow>) -> Vec<LeaderboardRow> {
    rows.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.name.cmp(&b.name)));
    assign_ranks(&mut rows, |row, rank| row.rank = rank);
    rows
}

/// Credits a gameweek win to every row holding the top score of that gameweek.
pub fn count_gameweek_wins(rows: &mut [MonthlyRow], event_ids: &[Gameweek]) {
    for row in rows.iter_mut() {
        row.gw_wins = 0;
    }

    for &event_id in event_ids {
        let Some(top) = rows.iter().map(|row| row.points_in(event_id)).max() else {
            return;
        };

        for row in rows.iter_mut().filter(|row| row.points_in(event_id) == top) {
            row.gw_wins += 1;
        }
    }
}

/// Counts gameweek wins, sorts by (month points, season total, wins) descending
/// and assigns 1-based ranks.
#[must_use]
pub fn rank_monthly(mut rows: Vec<MonthlyRow>, event_ids: &[Gameweek]) -> Vec<MonthlyRow> {
    count_gameweek_wins(&mut rows, event_ids);
    rows.sort_by_key(|row| {
        (
            Reverse(row.month_points),
            Reverse(row.season_total),
            Reverse(row.gw_wins),
        )
    });
    assign_ranks(&mut rows, |row, rank| row.rank = rank);
    rows
}

fn assign_ranks<T>(rows: &mut [T], mut set: impl FnMut(&mut T, usize)) {
    for (index, row) in rows.iter_mut().enumerate() {
        set(row, index + 1);
    }
}
