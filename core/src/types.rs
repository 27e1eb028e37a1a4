//! Shared primitive types used across the entire pipeline.

/// A stable player identifier, as found in the event payload.
pub type PlayerId = String;

/// An attribution partner name.
pub type Partner = String;

/// The canonical run identifier.
pub type RunId = String;

/// Partner assigned to players with no attribution entry.
pub const ORGANIC_PARTNER: &str = "organic";

/// Synthetic dashboard selector meaning "every partner".
pub const ALL_PARTNERS: &str = "All";

/// The only event type that carries playtime.
pub const MATCH_FINISH_EVENT: &str = "polar_hero_match_finish_event";

/// Rows per chunk when nothing else is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
