use anyhow::Context;

use crate::config::Config;
use crate::domain::{EntryId, Gameweek};
use crate::state::SharedState;

pub async fn cmd_points(
    config: Config,
    entry_id: i64,
    gameweek: Option<Gameweek>,
) -> anyhow::Result<()> {
    let entry_id = EntryId::new(entry_id);
    let state = SharedState::new(config).await?;

    let weekly = state
        .scoring
        .weekly_points(entry_id, gameweek)
        .await
        .with_context(|| format!("Failed to fetch points for entry {entry_id}"))?;

    println!(
        "Entry {entry_id}: {} points in gameweek {}",
        weekly.points, weekly.event_id
    );
    Ok(())
}
