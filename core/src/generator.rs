//! Synthetic event logs for tests and local runs.
//!
//! Same seed, same log, byte for byte. Events are shuffled before they are
//! returned so the pipeline never sees them in time order.

use crate::{
    attribution::AttributionEntry,
    error::MetricsResult,
    event::RawEventRow,
    rng::{DeterministicRng, RngStream},
    source::{COL_EVENT_DATA, COL_EVENT_TYPE, COL_TIMESTAMP},
    types::{PlayerId, MATCH_FINISH_EVENT},
};
use csv::WriterBuilder;
use serde_json::json;
use std::path::{Path, PathBuf};

/// 2024-01-01T00:00:00Z, day 0 of every generated log.
pub const EPOCH_START: i64 = 1_704_067_200;
pub const SECONDS_PER_DAY: i64 = 86_400;

const OTHER_EVENTS: [&str; 3] = ["session_start", "store_open", "polar_hero_level_up_event"];

#[derive(Debug, Clone)]
pub struct SyntheticLog {
    pub seed:           u64,
    pub players:        usize,
    /// Length of the observation window in days.
    pub days:           u32,
    pub partners:       Vec<String>,
    /// Share of players with no attribution row.
    pub organic_share:  f64,
    /// Per-day chance an acquired player comes back.
    pub return_rate:    f64,
    /// Share of extra rows with an unusable payload.
    pub malformed_rate: f64,
}

impl Default for SyntheticLog {
    fn default() -> Self {
        Self {
            seed:           42,
            players:        200,
            days:           14,
            partners:       vec!["adnet_alpha".into(), "adnet_beta".into(), "influencer".into()],
            organic_share:  0.3,
            return_rate:    0.35,
            malformed_rate: 0.02,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeneratedLog {
    pub events:      Vec<RawEventRow>,
    pub attribution: Vec<AttributionEntry>,
}

impl SyntheticLog {
    pub fn generate(&self) -> GeneratedLog {
        let mut players_rng = DeterministicRng::for_stream(self.seed, RngStream::Players);
        let mut activity_rng = DeterministicRng::for_stream(self.seed, RngStream::Activity);
        let mut attribution_rng = DeterministicRng::for_stream(self.seed, RngStream::Attribution);
        let mut corruption_rng = DeterministicRng::for_stream(self.seed, RngStream::Corruption);
        let mut shuffle_rng = DeterministicRng::for_stream(self.seed, RngStream::Shuffle);

        let mut log = GeneratedLog::default();
        let days = self.days.max(1) as u64;

        for _ in 0..self.players {
            let player_id = player_id(&mut players_rng);
            let acq_day = players_rng.below(days) as i64;

            if !self.partners.is_empty() && !attribution_rng.chance(self.organic_share) {
                let idx = attribution_rng.below(self.partners.len() as u64) as usize;
                let entry = AttributionEntry {
                    player_id: player_id.clone(),
                    partner:   self.partners[idx].clone(),
                };
                // Upstream exports occasionally repeat a row verbatim.
                if attribution_rng.chance(0.05) {
                    log.attribution.push(entry.clone());
                }
                log.attribution.push(entry);
            }

            // Acquisition day always has at least one event.
            log.events.push(event_row(&mut activity_rng, &player_id, acq_day));
            for day in (acq_day + 1)..(days as i64) {
                if activity_rng.chance(self.return_rate) {
                    let count = 1 + activity_rng.below(3);
                    for _ in 0..count {
                        log.events.push(event_row(&mut activity_rng, &player_id, day));
                    }
                }
            }
        }

        let extra = (log.events.len() as f64 * self.malformed_rate).round() as usize;
        for _ in 0..extra {
            log.events.push(malformed_row(&mut corruption_rng, days as i64));
        }

        shuffle_rng.shuffle(&mut log.events);
        log
    }
}

impl GeneratedLog {
    pub fn events_csv(&self) -> MetricsResult<String> {
        events_to_csv(&self.events)
    }

    pub fn attribution_csv(&self) -> MetricsResult<String> {
        let mut wtr = WriterBuilder::new().from_writer(Vec::new());
        wtr.write_record(["player_id", "attribution_partner"])?;
        for entry in &self.attribution {
            wtr.write_record([entry.player_id.as_str(), entry.partner.as_str()])?;
        }
        let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write `event-data.csv` and `attribution-partners.csv` into `dir`.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> MetricsResult<(PathBuf, PathBuf)> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let events_path = dir.join("event-data.csv");
        let attribution_path = dir.join("attribution-partners.csv");
        std::fs::write(&events_path, self.events_csv()?)?;
        std::fs::write(&attribution_path, self.attribution_csv()?)?;
        log::info!(
            "Generated {} events and {} attribution rows in {}",
            self.events.len(), self.attribution.len(), dir.display()
        );
        Ok((events_path, attribution_path))
    }
}

/// Render rows as an event-log CSV with the standard header.
pub fn events_to_csv(rows: &[RawEventRow]) -> MetricsResult<String> {
    let mut wtr = WriterBuilder::new().from_writer(Vec::new());
    wtr.write_record([COL_TIMESTAMP, COL_EVENT_TYPE, COL_EVENT_DATA])?;
    for row in rows {
        let ts = row.event_timestamp.map(|t| t.to_string()).unwrap_or_default();
        wtr.write_record([ts.as_str(), row.event_type.as_str(), row.event_data.as_str()])?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn player_id(rng: &mut DeterministicRng) -> PlayerId {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
}

fn event_row(rng: &mut DeterministicRng, player_id: &str, day: i64) -> RawEventRow {
    let ts = EPOCH_START + day * SECONDS_PER_DAY + rng.below(SECONDS_PER_DAY as u64) as i64;
    if rng.chance(0.6) {
        // Centisecond match times, 60 s to 30 min.
        let time_spent = if rng.chance(0.05) {
            serde_json::Value::Null
        } else {
            json!(60.0 + rng.below(174_000) as f64 / 100.0)
        };
        let payload = json!({
            "player_id": player_id,
            "hero_data": [
                { "hero_id": rng.below(40), "time_spent_in_match": time_spent },
                { "hero_id": rng.below(40), "time_spent_in_match": 5 },
            ],
        });
        RawEventRow::new(Some(ts), MATCH_FINISH_EVENT, &payload.to_string())
    } else {
        let kind = OTHER_EVENTS[rng.below(OTHER_EVENTS.len() as u64) as usize];
        let payload = json!({ "player_id": player_id, "platform": "ios" });
        RawEventRow::new(Some(ts), kind, &payload.to_string())
    }
}

fn malformed_row(rng: &mut DeterministicRng, days: i64) -> RawEventRow {
    let ts = EPOCH_START + rng.below((days * SECONDS_PER_DAY) as u64) as i64;
    match rng.below(4) {
        0 => RawEventRow::new(Some(ts), MATCH_FINISH_EVENT, "{\"player_id\": \"trunc"),
        1 => RawEventRow::new(Some(ts), "session_start", "{\"platform\": \"android\"}"),
        2 => RawEventRow::new(Some(ts), "session_start", "{\"player_id\": null}"),
        _ => RawEventRow::new(None, "session_start", "{\"player_id\": \"ghost\"}"),
    }
}
