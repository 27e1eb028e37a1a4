//! Cohort sizing and D1/D3/D7 retention.
//!
//! A cohort is every player acquired on the same date through the same
//! partner. A player is retained at day N when it has any activity on
//! `acq_date + N`.
//!
//! The pivot keeps "no data" apart from "measured zero": a cell is `None`
//! unless some cohort member was active at that offset.

use crate::{
    attribution::PlayerDirectory,
    error::{MetricsError, MetricsResult},
    reduce::DailyPlaytime,
    types::{Partner, PlayerId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Retention horizons, in days after acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RetentionDay {
    D1,
    D3,
    D7,
}

impl RetentionDay {
    pub const ALL: [RetentionDay; 3] = [Self::D1, Self::D3, Self::D7];

    pub fn offset(&self) -> i64 {
        match self {
            Self::D1 => 1,
            Self::D3 => 3,
            Self::D7 => 7,
        }
    }

    pub fn from_offset(days: i64) -> Option<Self> {
        match days {
            1 => Some(Self::D1),
            3 => Some(Self::D3),
            7 => Some(Self::D7),
            _ => None,
        }
    }

    /// Column name in the tidy output.
    pub fn column(&self) -> &'static str {
        match self {
            Self::D1 => "D1_Retention",
            Self::D3 => "D3_Retention",
            Self::D7 => "D7_Retention",
        }
    }
}

/// One player-day joined with the player's cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRow {
    pub player_id:        PlayerId,
    pub date:             NaiveDate,
    pub acq_date:         NaiveDate,
    pub partner:          Partner,
    pub total_time_spent: f64,
    pub days_since_acq:   i64,
}

/// Activity dated before the player's recorded acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityAnomaly {
    pub player_id:      PlayerId,
    pub date:           NaiveDate,
    pub acq_date:       NaiveDate,
    pub days_since_acq: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityTable {
    pub rows:      Vec<ActivityRow>,
    pub anomalies: Vec<IntegrityAnomaly>,
}

/// Join daily playtime with each player's acquisition date and partner.
/// Negative day offsets are kept and reported.
pub fn join_activity(daily: &[DailyPlaytime], players: &PlayerDirectory) -> ActivityTable {
    let mut table = ActivityTable::default();

    for day in daily {
        let Some(player) = players.get(&day.player_id) else {
            continue;
        };
        let days_since_acq = (day.date - player.acq_date).num_days();
        if days_since_acq < 0 {
            log::warn!(
                "Player {} active on {} before acquisition date {}",
                day.player_id, day.date, player.acq_date
            );
            table.anomalies.push(IntegrityAnomaly {
                player_id: day.player_id.clone(),
                date: day.date,
                acq_date: player.acq_date,
                days_since_acq,
            });
        }
        table.rows.push(ActivityRow {
            player_id:        day.player_id.clone(),
            date:             day.date,
            acq_date:         player.acq_date,
            partner:          player.partner.clone(),
            total_time_spent: day.total_time_spent,
            days_since_acq,
        });
    }
    table
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    pub acq_date:    NaiveDate,
    pub partner:     Partner,
    pub cohort_size: u64,
}

/// Distinct players per (acq_date, partner), sorted by key.
pub fn cohort_sizes(players: &PlayerDirectory) -> Vec<Cohort> {
    let mut sizes: BTreeMap<(NaiveDate, Partner), u64> = BTreeMap::new();
    for player in players.iter() {
        *sizes
            .entry((player.acq_date, player.partner.clone()))
            .or_insert(0) += 1;
    }
    sizes
        .into_iter()
        .map(|((acq_date, partner), cohort_size)| Cohort { acq_date, partner, cohort_size })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionRow {
    pub acq_date:       NaiveDate,
    pub partner:        Partner,
    pub day:            RetentionDay,
    pub retained_count: u64,
    pub retention_rate: f64,
}

impl RetentionRow {
    pub fn day_offset(&self) -> i64 {
        self.day.offset()
    }
}

/// Retention rates for one cohort, one optional cell per horizon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionPivotRow {
    pub d1: Option<f64>,
    pub d3: Option<f64>,
    pub d7: Option<f64>,
}

impl RetentionPivotRow {
    pub fn get(&self, day: RetentionDay) -> Option<f64> {
        match day {
            RetentionDay::D1 => self.d1,
            RetentionDay::D3 => self.d3,
            RetentionDay::D7 => self.d7,
        }
    }

    fn set(&mut self, day: RetentionDay, rate: f64) {
        match day {
            RetentionDay::D1 => self.d1 = Some(rate),
            RetentionDay::D3 => self.d3 = Some(rate),
            RetentionDay::D7 => self.d7 = Some(rate),
        }
    }
}

pub type RetentionPivot = BTreeMap<(NaiveDate, Partner), RetentionPivotRow>;

/// Count distinct retained players per cohort and horizon, then divide by
/// cohort size. Fails if a cohort with retained players has no size.
pub fn retention_rows(
    activity: &[ActivityRow],
    cohorts: &[Cohort],
) -> MetricsResult<Vec<RetentionRow>> {
    let mut retained: BTreeMap<(NaiveDate, Partner, RetentionDay), BTreeSet<&str>> =
        BTreeMap::new();
    for row in activity {
        if let Some(day) = RetentionDay::from_offset(row.days_since_acq) {
            retained
                .entry((row.acq_date, row.partner.clone(), day))
                .or_default()
                .insert(row.player_id.as_str());
        }
    }

    let sizes: BTreeMap<(NaiveDate, Partner), u64> = cohorts
        .iter()
        .map(|c| ((c.acq_date, c.partner.clone()), c.cohort_size))
        .collect();

    retained
        .into_iter()
        .map(|((acq_date, partner, day), players)| {
            let key = (acq_date, partner);
            let cohort_size = sizes
                .get(&key)
                .copied()
                .filter(|size| *size > 0)
                .ok_or_else(|| MetricsError::CohortIntegrity {
                    acq_date,
                    partner: key.1.clone(),
                })?;
            let (acq_date, partner) = key;
            let retained_count = players.len() as u64;
            Ok(RetentionRow {
                acq_date,
                partner,
                day,
                retained_count,
                retention_rate: retained_count as f64 / cohort_size as f64,
            })
        })
        .collect()
}

/// Reshape retention rows into one row per (acq_date, partner).
pub fn pivot(rows: &[RetentionRow]) -> RetentionPivot {
    let mut pivot = RetentionPivot::new();
    for row in rows {
        pivot
            .entry((row.acq_date, row.partner.clone()))
            .or_default()
            .set(row.day, row.retention_rate);
    }
    pivot
}
