//! End-to-end runs over files on disk.
//!
//! Same inputs must give byte-identical output, whatever the chunk size.

use retention_core::{
    attribution::AttributionTable,
    config::PipelineConfig,
    error::MetricsError,
    event::RawEventRow,
    generator::{events_to_csv, SyntheticLog, EPOCH_START, SECONDS_PER_DAY},
    pipeline::MetricsPipeline,
    source::InMemorySource,
    store::MetricsStore,
};
use std::path::{Path, PathBuf};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("retention-{name}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

fn config_for(dir: &Path, chunk_size: usize) -> PipelineConfig {
    PipelineConfig {
        events_path:      dir.join("event-data.csv").display().to_string(),
        attribution_path: dir.join("attribution-partners.csv").display().to_string(),
        output_path:      dir.join("dashboard_data.csv").display().to_string(),
        db_path:          None,
        chunk_size,
    }
}

fn generate_inputs(dir: &Path, seed: u64) {
    SyntheticLog { seed, players: 120, days: 10, ..SyntheticLog::default() }
        .generate()
        .write_to(dir)
        .expect("write generated inputs");
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn rerun_produces_identical_output() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = scratch_dir("idempotent");
    generate_inputs(&dir, 17);
    let config = config_for(&dir, 50);

    MetricsPipeline::new(config.clone()).unwrap().execute().unwrap();
    let first = std::fs::read(&config.output_path).unwrap();
    MetricsPipeline::new(config.clone()).unwrap().execute().unwrap();
    let second = std::fs::read(&config.output_path).unwrap();

    assert!(!first.is_empty());
    assert_eq!(first, second, "re-running changed the output table");
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn output_independent_of_chunk_size() {
    let log = SyntheticLog { seed: 23, players: 90, days: 9, ..SyntheticLog::default() }.generate();
    let source = InMemorySource::new("chunk-sizes", log.events_csv().unwrap());
    let attribution = AttributionTable::from_entries(log.attribution.clone());

    let csv_for = |chunk_size: usize| {
        let config = PipelineConfig { chunk_size, ..PipelineConfig::default() };
        MetricsPipeline::new(config)
            .unwrap()
            .run(&source, &attribution)
            .unwrap()
            .table
            .to_csv_string()
            .unwrap()
    };

    let reference = csv_for(log.events.len());
    for chunk_size in [1, 7, 1000] {
        assert_eq!(csv_for(chunk_size), reference, "chunk size {chunk_size} changed the output");
    }
}

#[test]
fn fractional_playtime_output_independent_of_chunk_size() {
    let rows: Vec<RawEventRow> = (0..60)
        .map(|i: i64| {
            let player = format!("p-{}", i % 4);
            let day = i % 3;
            let seconds = 12.3 + i as f64 * 0.71;
            RawEventRow::new(
                Some(EPOCH_START + day * SECONDS_PER_DAY + i),
                "polar_hero_match_finish_event",
                &format!(
                    r#"{{"player_id": "{player}", "hero_data": [{{"time_spent_in_match": {seconds}}}]}}"#
                ),
            )
        })
        .collect();
    let source = InMemorySource::new("fractional", events_to_csv(&rows).unwrap());
    let attribution = AttributionTable::default();

    let csv_for = |chunk_size: usize| {
        let config = PipelineConfig { chunk_size, ..PipelineConfig::default() };
        MetricsPipeline::new(config)
            .unwrap()
            .run(&source, &attribution)
            .unwrap()
            .table
            .to_csv_string()
            .unwrap()
    };

    let reference = csv_for(rows.len());
    for chunk_size in [1, 3, 7] {
        assert_eq!(csv_for(chunk_size), reference, "chunk size {chunk_size} changed the output");
    }
}

#[test]
fn missing_event_log_is_fatal_and_writes_nothing() {
    let dir = scratch_dir("missing-events");
    generate_inputs(&dir, 3);
    let config = config_for(&dir, 10);
    std::fs::remove_file(&config.events_path).unwrap();

    let err = MetricsPipeline::new(config.clone()).unwrap().execute().unwrap_err();
    assert!(matches!(err, MetricsError::MissingInput { .. }), "{err:?}");
    assert!(!Path::new(&config.output_path).exists());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_attribution_is_fatal() {
    let dir = scratch_dir("missing-attribution");
    generate_inputs(&dir, 4);
    let config = config_for(&dir, 10);
    std::fs::remove_file(&config.attribution_path).unwrap();

    let err = MetricsPipeline::new(config.clone()).unwrap().execute().unwrap_err();
    assert!(matches!(err, MetricsError::MissingInput { .. }), "{err:?}");
    assert!(!Path::new(&config.output_path).exists());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn corrupt_chunk_aborts_without_output() {
    let dir = scratch_dir("corrupt");
    generate_inputs(&dir, 5);
    let config = config_for(&dir, 25);

    let mut events = std::fs::read_to_string(&config.events_path).unwrap();
    events.push_str("1704067200,session_start\n");
    std::fs::write(&config.events_path, events).unwrap();

    let err = MetricsPipeline::new(config.clone()).unwrap().execute().unwrap_err();
    assert!(matches!(err, MetricsError::ChunkRead { .. }), "{err:?}");
    assert!(!Path::new(&config.output_path).exists());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn zero_chunk_size_rejected_up_front() {
    let config = PipelineConfig { chunk_size: 0, ..PipelineConfig::default() };
    assert!(matches!(
        MetricsPipeline::new(config),
        Err(MetricsError::InvalidConfig { .. })
    ));
}

#[test]
fn configured_database_receives_the_run() {
    let dir = scratch_dir("db");
    generate_inputs(&dir, 6);
    let db_path = dir.join("metrics.db").display().to_string();
    let config = PipelineConfig { db_path: Some(db_path.clone()), ..config_for(&dir, 40) };

    let pipeline = MetricsPipeline::new(config).unwrap();
    let report = pipeline.execute().unwrap();

    let store = MetricsStore::open(&db_path).unwrap();
    assert_eq!(store.run_count().unwrap(), 1);
    assert_eq!(
        store.metrics_for_run(&pipeline.run_id).unwrap().as_slice(),
        report.table.rows()
    );
    drop(store);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn pass_stats_account_for_every_row() {
    let log = SyntheticLog { seed: 31, players: 40, days: 6, malformed_rate: 0.1, ..SyntheticLog::default() }
        .generate();
    let source = InMemorySource::new("stats", log.events_csv().unwrap());
    let attribution = AttributionTable::from_entries(log.attribution.clone());
    let report = MetricsPipeline::new(PipelineConfig::default_test())
        .unwrap()
        .run(&source, &attribution)
        .unwrap();

    let rows = log.events.len() as u64;
    assert_eq!(report.acquisition_pass.rows_read, rows);
    assert_eq!(report.playtime_pass.rows_read, rows);
    assert_eq!(report.acquisition_pass.chunks, rows.div_ceil(3));
    assert!(report.playtime_pass.rows_dropped > 0, "malformed rows should be dropped");
    assert!(report.playtime_pass.rows_dropped >= report.acquisition_pass.rows_dropped);
}

#[test]
fn config_loads_from_json_with_defaults() {
    let dir = scratch_dir("config");
    let path = dir.join("job.json");
    std::fs::write(&path, r#"{"events_path": "logs/events.csv", "chunk_size": 250}"#).unwrap();

    let config = PipelineConfig::load(path.to_str().unwrap()).unwrap();
    assert_eq!(config.events_path, "logs/events.csv");
    assert_eq!(config.chunk_size, 250);
    assert_eq!(config.attribution_path, "attribution-partners.csv");
    assert_eq!(config.db_path, None);

    std::fs::write(&path, r#"{"chunk_size": 0}"#).unwrap();
    assert!(PipelineConfig::load(path.to_str().unwrap()).is_err());
    std::fs::remove_dir_all(&dir).unwrap();
}
