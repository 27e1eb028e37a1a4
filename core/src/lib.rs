//! Player retention and engagement metrics from a raw event log.
//!
//! The event log is folded in bounded chunks, twice: once for each
//! player's acquisition date, once for per-day playtime. The results are
//! joined with partner attribution into cohort retention and playtime
//! series, and composed into one tidy table per (date, partner).

pub mod attribution;
pub mod cohort;
pub mod config;
pub mod error;
pub mod event;
pub mod generator;
pub mod output;
pub mod pipeline;
pub mod playtime;
pub mod reduce;
pub mod rng;
pub mod source;
pub mod store;
pub mod types;
