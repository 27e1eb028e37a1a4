//! The tidy metrics table, the only contract with the dashboard.
//!
//! One row per (date, partner). Retention cells are keyed by acquisition
//! date, the playtime cell by activity date; both share the `date` column.
//! Any metric cell may be empty.

use crate::{
    cohort::RetentionPivot,
    error::{MetricsError, MetricsResult},
    playtime::PlaytimeRow,
    types::{Partner, ALL_PARTNERS},
};
use chrono::NaiveDate;
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TidyOutputRow {
    pub date: NaiveDate,
    #[serde(rename = "attribution_partner")]
    pub partner: Partner,
    #[serde(rename = "D1_Retention")]
    pub d1_retention: Option<f64>,
    #[serde(rename = "D3_Retention")]
    pub d3_retention: Option<f64>,
    #[serde(rename = "D7_Retention")]
    pub d7_retention: Option<f64>,
    pub avg_time_per_player_minutes: Option<f64>,
}

impl TidyOutputRow {
    fn empty(date: NaiveDate, partner: Partner) -> Self {
        Self {
            date,
            partner,
            d1_retention: None,
            d3_retention: None,
            d7_retention: None,
            avg_time_per_player_minutes: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsTable {
    rows: Vec<TidyOutputRow>,
}

impl MetricsTable {
    pub fn from_rows(mut rows: Vec<TidyOutputRow>) -> Self {
        rows.sort_by(|a, b| (a.date, &a.partner).cmp(&(b.date, &b.partner)));
        Self { rows }
    }

    pub fn rows(&self) -> &[TidyOutputRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, date: NaiveDate, partner: &str) -> Option<&TidyOutputRow> {
        self.rows
            .iter()
            .find(|r| r.date == date && r.partner == partner)
    }

    /// Dashboard selector values: "All", then every partner in the table.
    pub fn partner_options(&self) -> Vec<String> {
        let partners: BTreeSet<&str> = self.rows.iter().map(|r| r.partner.as_str()).collect();
        std::iter::once(ALL_PARTNERS)
            .chain(partners)
            .map(str::to_string)
            .collect()
    }

    /// Rows for one selector value. "All" means the unfiltered table.
    pub fn rows_for_partner(&self, selection: &str) -> Vec<&TidyOutputRow> {
        self.rows
            .iter()
            .filter(|r| selection == ALL_PARTNERS || r.partner == selection)
            .collect()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> MetricsResult<()> {
        let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
        if self.rows.is_empty() {
            wtr.write_record([
                "date",
                "attribution_partner",
                "D1_Retention",
                "D3_Retention",
                "D7_Retention",
                "avg_time_per_player_minutes",
            ])?;
        }
        for row in &self.rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> MetricsResult<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Write to a temporary sibling, then rename over `path`.
    /// A failure leaves any previous file untouched.
    pub fn write_csv_file(&self, path: impl AsRef<Path>) -> MetricsResult<()> {
        let path = path.as_ref();
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".partial");
        let tmp = std::path::PathBuf::from(tmp);

        let result = std::fs::File::create(&tmp)
            .map_err(MetricsError::from)
            .and_then(|file| self.write_csv(std::io::BufWriter::new(file)));
        if let Err(e) = result {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        std::fs::rename(&tmp, path)?;
        log::info!("Wrote {} metric rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}

/// Outer join of the retention pivot and the playtime aggregate.
pub fn compose(retention: &RetentionPivot, playtime: &[PlaytimeRow]) -> MetricsTable {
    let mut joined: BTreeMap<(NaiveDate, Partner), TidyOutputRow> = BTreeMap::new();

    for ((date, partner), cells) in retention {
        let row = joined
            .entry((*date, partner.clone()))
            .or_insert_with(|| TidyOutputRow::empty(*date, partner.clone()));
        row.d1_retention = cells.d1;
        row.d3_retention = cells.d3;
        row.d7_retention = cells.d7;
    }

    for p in playtime {
        let row = joined
            .entry((p.date, p.partner.clone()))
            .or_insert_with(|| TidyOutputRow::empty(p.date, p.partner.clone()));
        row.avg_time_per_player_minutes = Some(p.avg_time_per_player_minutes);
    }

    MetricsTable { rows: joined.into_values().collect() }
}
