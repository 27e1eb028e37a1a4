//! Chunked stream reduction: the two passes over the event log.
//!
//! PASS ORDER (fixed):
//!   1. Acquisition pass: global minimum timestamp per player.
//!   2. Playtime pass:    per-(player, date) summed playtime.
//!
//! Each pass reads the whole source once, one chunk at a time, so peak
//! memory is bounded by the chunk size plus the running aggregate. Reading
//! the log twice is the price paid for never holding it in memory.
//!
//! RULES:
//!   - Every aggregate is a `Partial` whose `merge` is associative and
//!     commutative. Results never depend on chunk size or row order.
//!   - Unusable rows are dropped and counted, never fatal.
//!   - A chunk that cannot be read aborts the pass.

use crate::{
    error::MetricsResult,
    event::{extract_player_id, EventRecord, RawEventRow},
    source::{ChunkReader, EventSource},
    types::PlayerId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A chunk-local aggregate that can be folded into another.
pub trait Partial: Default {
    /// Absorb `other`. Must be associative and commutative.
    fn merge(&mut self, other: Self);
}

/// Left fold of partials in iteration order.
pub fn fold_partials<P: Partial>(parts: impl IntoIterator<Item = P>) -> P {
    parts.into_iter().fold(P::default(), |mut acc, part| {
        acc.merge(part);
        acc
    })
}

/// Pairwise reduction tree over partials.
/// Same result as `fold_partials` for any lawful `merge`.
pub fn reduce_tree<P: Partial>(mut parts: Vec<P>) -> P {
    while parts.len() > 1 {
        let mut next = Vec::with_capacity(parts.len().div_ceil(2));
        let mut iter = parts.into_iter();
        while let Some(mut left) = iter.next() {
            if let Some(right) = iter.next() {
                left.merge(right);
            }
            next.push(left);
        }
        parts = next;
    }
    parts.pop().unwrap_or_default()
}

// ── Acquisition ──────────────────────────────────────────────────────────────

/// Earliest event timestamp per player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcquisitionPartial {
    first_seen: HashMap<PlayerId, DateTime<Utc>>,
}

impl AcquisitionPartial {
    /// Per-player minimum within one chunk. Returns the partial and the
    /// number of rows dropped.
    pub fn from_chunk(rows: &[RawEventRow]) -> (Self, u64) {
        let mut partial = Self::default();
        let mut dropped = 0u64;
        for row in rows {
            let parsed = row
                .timestamp()
                .and_then(|ts| extract_player_id(&row.event_data).map(|pid| (pid, ts)));
            match parsed {
                Some((player_id, ts)) => partial.observe(player_id, ts),
                None => dropped += 1,
            }
        }
        (partial, dropped)
    }

    pub fn observe(&mut self, player_id: PlayerId, ts: DateTime<Utc>) {
        self.first_seen
            .entry(player_id)
            .and_modify(|seen| {
                if ts < *seen {
                    *seen = ts;
                }
            })
            .or_insert(ts);
    }

    pub fn len(&self) -> usize {
        self.first_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }

    pub fn first_seen(&self, player_id: &str) -> Option<DateTime<Utc>> {
        self.first_seen.get(player_id).copied()
    }

    /// One record per player, sorted by player id.
    pub fn into_records(self) -> Vec<AcquisitionRecord> {
        let mut records: Vec<AcquisitionRecord> = self
            .first_seen
            .into_iter()
            .map(|(player_id, ts)| AcquisitionRecord {
                player_id,
                acq_timestamp: ts,
                acq_date: ts.date_naive(),
            })
            .collect();
        records.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        records
    }
}

impl Partial for AcquisitionPartial {
    fn merge(&mut self, other: Self) {
        for (player_id, ts) in other.first_seen {
            self.observe(player_id, ts);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionRecord {
    pub player_id:     PlayerId,
    pub acq_timestamp: DateTime<Utc>,
    pub acq_date:      NaiveDate,
}

// ── Daily playtime ───────────────────────────────────────────────────────────

/// Fixed-point resolution of accumulated playtime.
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Summed playtime per (player, date). Any event creates the key.
///
/// Totals are held as integer microseconds: float addition is not
/// associative, and the grouping of sums follows chunk boundaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaytimePartial {
    totals: HashMap<(PlayerId, NaiveDate), i64>,
}

impl PlaytimePartial {
    pub fn from_chunk(rows: &[RawEventRow]) -> (Self, u64) {
        let mut partial = Self::default();
        let mut dropped = 0u64;
        for row in rows {
            match EventRecord::from_raw(row) {
                Some(event) => {
                    let date = event.date();
                    let seconds = event.time_spent();
                    partial.add(event.player_id, date, seconds);
                }
                None => dropped += 1,
            }
        }
        (partial, dropped)
    }

    pub fn add(&mut self, player_id: PlayerId, date: NaiveDate, seconds: f64) {
        self.add_micros(player_id, date, seconds_to_micros(seconds));
    }

    fn add_micros(&mut self, player_id: PlayerId, date: NaiveDate, micros: i64) {
        let total = self.totals.entry((player_id, date)).or_insert(0);
        *total = total.saturating_add(micros);
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn total(&self, player_id: &str, date: NaiveDate) -> Option<f64> {
        self.totals
            .get(&(player_id.to_string(), date))
            .map(|&micros| micros_to_seconds(micros))
    }

    /// Rows sorted by (player, date).
    pub fn into_rows(self) -> Vec<DailyPlaytime> {
        let mut rows: Vec<DailyPlaytime> = self
            .totals
            .into_iter()
            .map(|((player_id, date), micros)| DailyPlaytime {
                player_id,
                date,
                total_time_spent: micros_to_seconds(micros),
            })
            .collect();
        rows.sort_by(|a, b| (&a.player_id, a.date).cmp(&(&b.player_id, b.date)));
        rows
    }
}

impl Partial for PlaytimePartial {
    fn merge(&mut self, other: Self) {
        for ((player_id, date), micros) in other.totals {
            self.add_micros(player_id, date, micros);
        }
    }
}

/// Round to the nearest microsecond. Saturates at the i64 range.
fn seconds_to_micros(seconds: f64) -> i64 {
    (seconds * MICROS_PER_SECOND).round() as i64
}

fn micros_to_seconds(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_SECOND
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPlaytime {
    pub player_id:        PlayerId,
    pub date:             NaiveDate,
    /// Seconds.
    pub total_time_spent: f64,
}

// ── Passes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStats {
    pub chunks:       u64,
    pub rows_read:    u64,
    pub rows_dropped: u64,
}

impl PassStats {
    fn record_chunk(&mut self, rows: usize, dropped: u64) {
        self.chunks += 1;
        self.rows_read += rows as u64;
        self.rows_dropped += dropped;
    }
}

/// Pass 1: fold every chunk's per-player minimum into a running global map.
pub fn acquisition_pass(
    source: &dyn EventSource,
    chunk_size: usize,
) -> MetricsResult<(AcquisitionPartial, PassStats)> {
    let mut global = AcquisitionPartial::default();
    let mut stats = PassStats::default();

    for chunk in ChunkReader::open(source, chunk_size)? {
        let rows = chunk?;
        let (partial, dropped) = AcquisitionPartial::from_chunk(&rows);
        log::debug!(
            "acquisition chunk {}: {} rows, {} dropped, {} players",
            stats.chunks, rows.len(), dropped, partial.len()
        );
        stats.record_chunk(rows.len(), dropped);
        global.merge(partial);
    }

    log::info!(
        "Acquisition pass over {}: {} chunks, {} rows, {} dropped, {} players",
        source.name(), stats.chunks, stats.rows_read, stats.rows_dropped, global.len()
    );
    Ok((global, stats))
}

/// Pass 2: sum playtime within each chunk, keep the chunk partials, then
/// re-aggregate them once the log is exhausted. A day's events may straddle
/// any number of chunks, so the second sum is required.
pub fn playtime_pass(
    source: &dyn EventSource,
    chunk_size: usize,
) -> MetricsResult<(PlaytimePartial, PassStats)> {
    let mut partials = Vec::new();
    let mut stats = PassStats::default();

    for chunk in ChunkReader::open(source, chunk_size)? {
        let rows = chunk?;
        let (partial, dropped) = PlaytimePartial::from_chunk(&rows);
        log::debug!(
            "playtime chunk {}: {} rows, {} dropped, {} player-days",
            stats.chunks, rows.len(), dropped, partial.len()
        );
        stats.record_chunk(rows.len(), dropped);
        partials.push(partial);
    }

    let combined = reduce_tree(partials);
    log::info!(
        "Playtime pass over {}: {} chunks, {} rows, {} dropped, {} player-days",
        source.name(), stats.chunks, stats.rows_read, stats.rows_dropped, combined.len()
    );
    Ok((combined, stats))
}
