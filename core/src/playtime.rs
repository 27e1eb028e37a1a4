//! Average daily playtime per partner.

use crate::{
    cohort::ActivityRow,
    types::{Partner, PlayerId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaytimeRow {
    pub date:                        NaiveDate,
    pub partner:                     Partner,
    pub total_time_played_seconds:   f64,
    pub active_players:              u64,
    pub avg_time_per_player_minutes: f64,
}

/// Sum playtime and count distinct active players per (date, partner).
/// Only groups with at least one player exist, so the average is always
/// defined.
pub fn aggregate_playtime(activity: &[ActivityRow]) -> Vec<PlaytimeRow> {
    let mut groups: BTreeMap<(NaiveDate, &str), (f64, HashSet<&PlayerId>)> = BTreeMap::new();
    for row in activity {
        let (seconds, players) = groups.entry((row.date, row.partner.as_str())).or_default();
        *seconds += row.total_time_spent;
        players.insert(&row.player_id);
    }

    groups
        .into_iter()
        .map(|((date, partner), (seconds, players))| {
            let active_players = players.len() as u64;
            PlaytimeRow {
                date,
                partner: partner.to_string(),
                total_time_played_seconds: seconds,
                active_players,
                avg_time_per_player_minutes: seconds / active_players as f64 / 60.0,
            }
        })
        .collect()
}
