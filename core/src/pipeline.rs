//! The metrics pipeline: one batch run from raw events to the tidy table.
//!
//! STAGE ORDER (fixed):
//!   1. Acquisition pass     (reduce.rs)
//!   2. Attribution join     (attribution.rs)
//!   3. Cohort sizing        (cohort.rs)
//!   4. Playtime pass        (reduce.rs)
//!   5. Activity join        (cohort.rs)
//!   6. Retention + pivot    (cohort.rs)
//!   7. Playtime aggregate   (playtime.rs)
//!   8. Output composition   (output.rs)
//!
//! RULES:
//!   - Inputs are checked before any pass runs; a missing file is fatal.
//!   - Output is written only after every stage succeeded.
//!   - The run holds no state across runs; same inputs, same table.

use crate::{
    attribution::AttributionTable,
    cohort::{self, Cohort, IntegrityAnomaly, RetentionRow},
    config::PipelineConfig,
    error::MetricsResult,
    output::{self, MetricsTable},
    playtime::{self, PlaytimeRow},
    reduce::{self, AcquisitionRecord, DailyPlaytime, PassStats},
    source::{CsvFileSource, EventSource},
    store::MetricsStore,
    types::RunId,
};

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub acquisitions:     Vec<AcquisitionRecord>,
    pub daily_playtime:   Vec<DailyPlaytime>,
    pub cohorts:          Vec<Cohort>,
    pub retention:        Vec<RetentionRow>,
    pub playtime:         Vec<PlaytimeRow>,
    pub anomalies:        Vec<IntegrityAnomaly>,
    pub acquisition_pass: PassStats,
    pub playtime_pass:    PassStats,
    pub table:            MetricsTable,
}

impl PipelineReport {
    pub fn player_count(&self) -> usize {
        self.acquisitions.len()
    }
}

pub struct MetricsPipeline {
    pub run_id: RunId,
    config:     PipelineConfig,
}

impl MetricsPipeline {
    pub fn new(config: PipelineConfig) -> MetricsResult<Self> {
        config.validate()?;
        Ok(Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Compute every metric from an event source and an attribution table.
    /// Writes nothing.
    pub fn run(
        &self,
        events: &dyn EventSource,
        attribution: &AttributionTable,
    ) -> MetricsResult<PipelineReport> {
        let chunk_size = self.config.chunk_size;
        log::info!("Run {}: reading {} in chunks of {chunk_size}", self.run_id, events.name());

        let (acquired, acquisition_pass) = reduce::acquisition_pass(events, chunk_size)?;
        let acquisitions = acquired.into_records();

        let players = attribution.attribute(&acquisitions);
        let cohorts = cohort::cohort_sizes(&players);

        let (daily, playtime_pass) = reduce::playtime_pass(events, chunk_size)?;
        let daily_playtime = daily.into_rows();

        let activity = cohort::join_activity(&daily_playtime, &players);
        if !activity.anomalies.is_empty() {
            log::warn!(
                "{} player-days predate their acquisition date",
                activity.anomalies.len()
            );
        }

        let retention = cohort::retention_rows(&activity.rows, &cohorts)?;
        let pivot = cohort::pivot(&retention);
        let playtime = playtime::aggregate_playtime(&activity.rows);
        let table = output::compose(&pivot, &playtime);

        log::info!(
            "Run {}: {} players, {} cohorts, {} retention rows, {} metric rows",
            self.run_id, acquisitions.len(), cohorts.len(), retention.len(), table.len()
        );

        Ok(PipelineReport {
            acquisitions,
            daily_playtime,
            cohorts,
            retention,
            playtime,
            anomalies: activity.anomalies,
            acquisition_pass,
            playtime_pass,
            table,
        })
    }

    /// Full job: load inputs named by the config, run, write the CSV and,
    /// when configured, persist the run to SQLite.
    pub fn execute(&self) -> MetricsResult<PipelineReport> {
        let events = CsvFileSource::new(&self.config.events_path)?;
        let attribution = AttributionTable::load(&self.config.attribution_path)?;

        let report = self.run(&events, &attribution)?;
        report.table.write_csv_file(&self.config.output_path)?;

        if let Some(db_path) = &self.config.db_path {
            let store = MetricsStore::open(db_path)?;
            store.migrate()?;
            store.insert_run(&self.run_id, self.config.chunk_size, &self.config.events_path)?;
            store.save_report(&self.run_id, &report)?;
            log::info!("Run {} persisted to {db_path}", self.run_id);
        }
        Ok(report)
    }
}
