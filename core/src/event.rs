//! Event record parsing.
//!
//! RULE: Parsing never fails the job.
//! A row that cannot yield a player id is "absent" and the caller drops it.
//! Nothing in here logs per row; the passes summarize drop counts.

use crate::types::{PlayerId, MATCH_FINISH_EVENT};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of the event log, as read from the source.
/// Only the three columns the pipeline needs are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEventRow {
    pub event_timestamp: Option<i64>,
    pub event_type:      String,
    pub event_data:      String,
}

impl RawEventRow {
    pub fn new(event_timestamp: Option<i64>, event_type: &str, event_data: &str) -> Self {
        Self {
            event_timestamp,
            event_type: event_type.to_string(),
            event_data: event_data.to_string(),
        }
    }

    /// Event instant in UTC, if the timestamp column was usable.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.event_timestamp
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }

    /// Calendar date (UTC) of the event.
    pub fn date(&self) -> Option<NaiveDate> {
        self.timestamp().map(|ts| ts.date_naive())
    }
}

/// A fully parsed, usable event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub player_id:           PlayerId,
    pub timestamp:           DateTime<Utc>,
    pub event_type:          String,
    /// Present only for match-finish events.
    pub time_spent_in_match: Option<f64>,
}

impl EventRecord {
    /// Parse a raw row for the playtime pass.
    /// Returns None when the row has no usable timestamp or player id.
    pub fn from_raw(row: &RawEventRow) -> Option<Self> {
        let timestamp = row.timestamp()?;
        let sample = extract_playtime(&row.event_type, &row.event_data)?;
        let time_spent_in_match = if row.event_type == MATCH_FINISH_EVENT {
            Some(sample.time_spent)
        } else {
            None
        };
        Some(Self {
            player_id: sample.player_id,
            timestamp,
            event_type: row.event_type.clone(),
            time_spent_in_match,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Seconds this event adds to the player's daily playtime.
    pub fn time_spent(&self) -> f64 {
        self.time_spent_in_match.unwrap_or(0.0)
    }
}

/// Player id and playtime pulled from one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaytimeSample {
    pub player_id:  PlayerId,
    pub time_spent: f64,
}

/// Parse the `event_timestamp` column.
/// Integer seconds; float literals are truncated toward zero.
pub fn parse_timestamp(field: &str) -> Option<i64> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    if let Ok(secs) = field.parse::<i64>() {
        return Some(secs);
    }
    field
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() < i64::MAX as f64)
        .map(|v| v.trunc() as i64)
}

/// Player id for the acquisition pass. Any event type counts.
pub fn extract_player_id(event_data: &str) -> Option<PlayerId> {
    let payload = parse_payload(event_data)?;
    player_id_of(&payload)
}

/// Player id and playtime for the playtime pass.
///
/// Only `polar_hero_match_finish_event` rows carry playtime, taken from the
/// first entry of `hero_data`. Other event types yield 0.0.
pub fn extract_playtime(event_type: &str, event_data: &str) -> Option<PlaytimeSample> {
    let payload = parse_payload(event_data)?;
    let player_id = player_id_of(&payload)?;

    let time_spent = if event_type == MATCH_FINISH_EVENT {
        match payload.get("hero_data") {
            Some(Value::Array(heroes)) => match heroes.first() {
                Some(Value::Object(hero)) => match hero.get("time_spent_in_match") {
                    None | Some(Value::Null) => 0.0,
                    Some(Value::Number(n)) => n.as_f64()?,
                    // Wrong type: the whole record is unusable.
                    Some(_) => return None,
                },
                None => 0.0,
                Some(_) => return None,
            },
            _ => 0.0,
        }
    } else {
        0.0
    };

    Some(PlaytimeSample { player_id, time_spent })
}

fn parse_payload(event_data: &str) -> Option<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(event_data).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn player_id_of(payload: &serde_json::Map<String, Value>) -> Option<PlayerId> {
    match payload.get("player_id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(number_id(n)),
        _ => None,
    }
}

/// Integral floats render without a fraction so `1500.0` and `1500` agree.
fn number_id(n: &serde_json::Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < 9.0e15 {
                return format!("{}", f as i64);
            }
        }
    }
    n.to_string()
}
