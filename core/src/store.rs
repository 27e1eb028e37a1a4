//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! The pipeline hands over finished results; it never executes SQL.

use crate::{
    cohort::Cohort,
    error::{MetricsError, MetricsResult},
    output::TidyOutputRow,
    pipeline::PipelineReport,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection};

pub struct MetricsStore {
    conn: Connection,
}

impl MetricsStore {
    /// Open (or create) the metrics database at `path`.
    pub fn open(path: &str) -> MetricsResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> MetricsResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> MetricsResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_metrics.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, chunk_size: usize, events_path: &str) -> MetricsResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, chunk_size, events_path, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                run_id,
                chunk_size as i64,
                events_path,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn run_count(&self) -> MetricsResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM run", [], |row| row.get(0))?;
        Ok(count)
    }

    // ── Results ────────────────────────────────────────────────

    /// Persist cohorts, retention rows and the tidy table in one transaction.
    pub fn save_report(&self, run_id: &str, report: &PipelineReport) -> MetricsResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO cohort (run_id, acq_date, partner, cohort_size)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for c in &report.cohorts {
                stmt.execute(params![
                    run_id,
                    c.acq_date.to_string(),
                    c.partner,
                    c.cohort_size as i64,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO retention
                    (run_id, acq_date, partner, day_offset, retained_count, retention_rate)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for r in &report.retention {
                stmt.execute(params![
                    run_id,
                    r.acq_date.to_string(),
                    r.partner,
                    r.day_offset(),
                    r.retained_count as i64,
                    r.retention_rate,
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO metrics_row
                    (run_id, date, partner, d1_retention, d3_retention, d7_retention,
                     avg_time_per_player_minutes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in report.table.rows() {
                stmt.execute(params![
                    run_id,
                    row.date.to_string(),
                    row.partner,
                    row.d1_retention,
                    row.d3_retention,
                    row.d7_retention,
                    row.avg_time_per_player_minutes,
                ])?;
            }
        }
        tx.commit()?;
        log::debug!(
            "Saved run {run_id}: {} cohorts, {} retention rows, {} metric rows",
            report.cohorts.len(), report.retention.len(), report.table.len()
        );
        Ok(())
    }

    pub fn metrics_for_run(&self, run_id: &str) -> MetricsResult<Vec<TidyOutputRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, partner, d1_retention, d3_retention, d7_retention,
                    avg_time_per_player_minutes
             FROM metrics_row WHERE run_id = ?1
             ORDER BY date ASC, partner ASC",
        )?;
        let raw = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(date, partner, d1, d3, d7, avg)| {
                Ok(TidyOutputRow {
                    date: parse_date(&date)?,
                    partner,
                    d1_retention: d1,
                    d3_retention: d3,
                    d7_retention: d7,
                    avg_time_per_player_minutes: avg,
                })
            })
            .collect()
    }

    pub fn cohorts_for_run(&self, run_id: &str) -> MetricsResult<Vec<Cohort>> {
        let mut stmt = self.conn.prepare(
            "SELECT acq_date, partner, cohort_size FROM cohort
             WHERE run_id = ?1 ORDER BY acq_date ASC, partner ASC",
        )?;
        let raw = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(acq_date, partner, size)| {
                Ok(Cohort {
                    acq_date: parse_date(&acq_date)?,
                    partner,
                    cohort_size: size as u64,
                })
            })
            .collect()
    }

    pub fn retention_row_count(&self, run_id: &str) -> MetricsResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM retention WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Retention rows for one cohort, ordered by day offset.
    pub fn retention_for_cohort(
        &self,
        run_id: &str,
        acq_date: NaiveDate,
        partner: &str,
    ) -> MetricsResult<Vec<(i64, u64, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT day_offset, retained_count, retention_rate FROM retention
             WHERE run_id = ?1 AND acq_date = ?2 AND partner = ?3
             ORDER BY day_offset ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id, acq_date.to_string(), partner], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)? as u64,
                    row.get::<_, f64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn parse_date(value: &str) -> MetricsResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| MetricsError::InvalidStoredDate {
        value: value.to_string(),
    })
}
