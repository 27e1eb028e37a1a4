//! Partner attribution and the player join.
//!
//! The attribution table is assumed deduplicated upstream. It is still
//! deduplicated here, and a player with conflicting partners keeps the
//! partner from its first row.

use crate::{
    error::{MetricsError, MetricsResult},
    reduce::AcquisitionRecord,
    types::{Partner, PlayerId, ORGANIC_PARTNER},
};
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributionEntry {
    pub player_id: PlayerId,
    #[serde(rename = "attribution_partner")]
    pub partner:   Partner,
}

#[derive(Debug, Clone, Default)]
pub struct AttributionTable {
    by_player: HashMap<PlayerId, Partner>,
    partners:  Vec<Partner>,
    conflicts: usize,
}

impl AttributionTable {
    /// Load the attribution CSV. A missing file is fatal.
    pub fn load(path: impl AsRef<Path>) -> MetricsResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(MetricsError::MissingInput {
                path: path.display().to_string(),
            });
        }
        let file = std::fs::File::open(path)?;
        let table = Self::from_reader(file, &path.display().to_string())?;
        log::info!(
            "Loaded attribution from {}: {} players, {} partners",
            path.display(), table.len(), table.partners.len()
        );
        Ok(table)
    }

    /// Read attribution rows from any CSV reader.
    /// Headers and fields are trimmed. Extra columns are ignored; a missing
    /// required column is an error.
    pub fn from_reader<R: Read>(reader: R, source_name: &str) -> MetricsResult<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();
        for column in ["player_id", "attribution_partner"] {
            if !headers.iter().any(|h| h == column) {
                return Err(MetricsError::MissingColumn {
                    column:      column.to_string(),
                    source_name: source_name.to_string(),
                });
            }
        }
        let entries = rdr
            .deserialize::<AttributionEntry>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = AttributionEntry>) -> Self {
        let mut table = Self::default();
        let mut seen: HashSet<AttributionEntry> = HashSet::new();
        let mut known_partners: HashSet<Partner> = HashSet::new();

        for entry in entries {
            if entry.player_id.trim().is_empty() || !seen.insert(entry.clone()) {
                continue;
            }
            if known_partners.insert(entry.partner.clone()) {
                table.partners.push(entry.partner.clone());
            }
            if table.by_player.contains_key(&entry.player_id) {
                table.conflicts += 1;
            } else {
                table.by_player.insert(entry.player_id, entry.partner);
            }
        }

        if table.conflicts > 0 {
            log::warn!(
                "Attribution table has {} conflicting partner rows; first occurrence kept",
                table.conflicts
            );
        }
        table
    }

    /// Partner credited with `player_id`, or "organic".
    pub fn partner_for(&self, player_id: &str) -> &str {
        self.by_player
            .get(player_id)
            .map(String::as_str)
            .unwrap_or(ORGANIC_PARTNER)
    }

    /// Distinct partners in first-appearance order.
    pub fn partners(&self) -> &[Partner] {
        &self.partners
    }

    /// Rows dropped because a player already had a different partner.
    pub fn conflicts(&self) -> usize {
        self.conflicts
    }

    pub fn len(&self) -> usize {
        self.by_player.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_player.is_empty()
    }

    /// Left join of acquisitions against the table.
    pub fn attribute(&self, acquisitions: &[AcquisitionRecord]) -> PlayerDirectory {
        let players = acquisitions
            .iter()
            .map(|acq| {
                (
                    acq.player_id.clone(),
                    AttributedPlayer {
                        player_id: acq.player_id.clone(),
                        acq_date:  acq.acq_date,
                        partner:   self.partner_for(&acq.player_id).to_string(),
                    },
                )
            })
            .collect();
        PlayerDirectory { players }
    }
}

/// A player with its acquisition date and partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributedPlayer {
    pub player_id: PlayerId,
    pub acq_date:  NaiveDate,
    pub partner:   Partner,
}

/// Every acquired player, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct PlayerDirectory {
    players: HashMap<PlayerId, AttributedPlayer>,
}

impl PlayerDirectory {
    pub fn get(&self, player_id: &str) -> Option<&AttributedPlayer> {
        self.players.get(player_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributedPlayer> {
        self.players.values()
    }
}
