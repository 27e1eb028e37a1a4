//! retention-runner: batch job computing retention and playtime metrics.
//!
//! Usage:
//!   retention-runner --events event-data.csv --attribution attribution-partners.csv
//!   retention-runner --config job.json --db metrics.db --chunk-size 5000
//!   retention-runner --generate ./data --seed 7 --players 500 --days 21

use anyhow::Result;
use retention_core::{
    config::PipelineConfig,
    generator::SyntheticLog,
    pipeline::{MetricsPipeline, PipelineReport},
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if let Some(dir) = string_arg(&args, "--generate") {
        let synthetic = SyntheticLog {
            seed: parse_arg(&args, "--seed", 42u64),
            players: parse_arg(&args, "--players", 200usize),
            days: parse_arg(&args, "--days", 14u32),
            ..SyntheticLog::default()
        };
        let (events, attribution) = synthetic.generate().write_to(dir)?;
        println!("Generated inputs");
        println!("  events:      {}", events.display());
        println!("  attribution: {}", attribution.display());
        return Ok(());
    }

    let mut config = match string_arg(&args, "--config") {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(v) = string_arg(&args, "--events") {
        config.events_path = v.to_string();
    }
    if let Some(v) = string_arg(&args, "--attribution") {
        config.attribution_path = v.to_string();
    }
    if let Some(v) = string_arg(&args, "--output") {
        config.output_path = v.to_string();
    }
    if let Some(v) = string_arg(&args, "--db") {
        config.db_path = Some(v.to_string());
    }
    config.chunk_size = parse_arg(&args, "--chunk-size", config.chunk_size);

    println!("Retention metrics: retention-runner");
    println!("  events:      {}", config.events_path);
    println!("  attribution: {}", config.attribution_path);
    println!("  output:      {}", config.output_path);
    println!("  db:          {}", config.db_path.as_deref().unwrap_or("(none)"));
    println!("  chunk size:  {}", config.chunk_size);
    println!();

    let pipeline = MetricsPipeline::new(config)?;
    let report = pipeline.execute()?;
    print_summary(&pipeline, &report);
    Ok(())
}

fn print_summary(pipeline: &MetricsPipeline, report: &PipelineReport) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:          {}", pipeline.run_id);
    println!("  players:         {}", report.player_count());
    println!("  cohorts:         {}", report.cohorts.len());
    println!("  retention rows:  {}", report.retention.len());
    println!("  metric rows:     {}", report.table.len());
    println!(
        "  rows read:       {} ({} dropped)",
        report.playtime_pass.rows_read, report.playtime_pass.rows_dropped
    );
    println!("  chunks per pass: {}", report.playtime_pass.chunks);
    println!("  anomalies:       {}", report.anomalies.len());
    println!("  partners:        {}", report.table.partner_options().join(", "));
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
