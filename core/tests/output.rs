//! Tidy table composition, CSV layout, and the dashboard helpers.

use chrono::NaiveDate;
use retention_core::{
    cohort::{RetentionPivot, RetentionPivotRow},
    output::{compose, MetricsTable, TidyOutputRow},
    playtime::PlaytimeRow,
};

fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
}

fn playtime(date: NaiveDate, partner: &str, minutes: f64) -> PlaytimeRow {
    PlaytimeRow {
        date,
        partner: partner.into(),
        total_time_played_seconds: minutes * 60.0,
        active_players: 1,
        avg_time_per_player_minutes: minutes,
    }
}

fn row(date: NaiveDate, partner: &str) -> TidyOutputRow {
    TidyOutputRow {
        date,
        partner: partner.into(),
        d1_retention: None,
        d3_retention: None,
        d7_retention: None,
        avg_time_per_player_minutes: None,
    }
}

#[test]
fn outer_join_keeps_one_sided_keys() {
    let mut pivot = RetentionPivot::new();
    pivot.insert(
        (day(1), "alpha".into()),
        RetentionPivotRow { d1: Some(0.5), d3: None, d7: Some(0.25) },
    );
    pivot.insert((day(2), "beta".into()), RetentionPivotRow { d1: Some(1.0), ..Default::default() });
    let play = vec![playtime(day(1), "alpha", 3.0), playtime(day(3), "alpha", 1.5)];

    let table = compose(&pivot, &play);
    assert_eq!(table.len(), 3);

    let both = table.get(day(1), "alpha").unwrap();
    assert_eq!(both.d1_retention, Some(0.5));
    assert_eq!(both.d3_retention, None);
    assert_eq!(both.d7_retention, Some(0.25));
    assert_eq!(both.avg_time_per_player_minutes, Some(3.0));

    let retention_only = table.get(day(2), "beta").unwrap();
    assert_eq!(retention_only.avg_time_per_player_minutes, None);

    let playtime_only = table.get(day(3), "alpha").unwrap();
    assert_eq!(playtime_only.d1_retention, None);
    assert_eq!(playtime_only.avg_time_per_player_minutes, Some(1.5));
}

#[test]
fn rows_ordered_by_date_then_partner() {
    let play = vec![
        playtime(day(2), "beta", 1.0),
        playtime(day(1), "zeta", 1.0),
        playtime(day(2), "alpha", 1.0),
    ];
    let table = compose(&RetentionPivot::new(), &play);
    let keys: Vec<(NaiveDate, &str)> =
        table.rows().iter().map(|r| (r.date, r.partner.as_str())).collect();
    assert_eq!(keys, vec![(day(1), "zeta"), (day(2), "alpha"), (day(2), "beta")]);
}

#[test]
fn csv_has_fixed_header_and_empty_cells() {
    let mut r = row(day(1), "X");
    r.d1_retention = Some(0.5);
    r.avg_time_per_player_minutes = Some(2.0);
    let table = MetricsTable::from_rows(vec![r]);

    let csv = table.to_csv_string().unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "date,attribution_partner,D1_Retention,D3_Retention,D7_Retention,avg_time_per_player_minutes"
    );
    assert_eq!(lines[1], "2024-01-01,X,0.5,,,2.0");
    assert_eq!(lines.len(), 2);
}

#[test]
fn empty_table_still_writes_header() {
    let csv = MetricsTable::default().to_csv_string().unwrap();
    assert_eq!(
        csv.trim_end(),
        "date,attribution_partner,D1_Retention,D3_Retention,D7_Retention,avg_time_per_player_minutes"
    );
}

#[test]
fn partner_options_start_with_all() {
    let table = MetricsTable::from_rows(vec![
        row(day(1), "organic"),
        row(day(1), "beta"),
        row(day(2), "beta"),
    ]);
    assert_eq!(table.partner_options(), vec!["All", "beta", "organic"]);
}

#[test]
fn all_selection_is_unfiltered() {
    let table = MetricsTable::from_rows(vec![
        row(day(1), "organic"),
        row(day(1), "beta"),
        row(day(2), "beta"),
    ]);
    assert_eq!(table.rows_for_partner("All").len(), 3);
    assert_eq!(table.rows_for_partner("beta").len(), 2);
    assert!(table.rows_for_partner("gamma").is_empty());
}

#[test]
fn csv_file_written_in_place_without_leftovers() {
    let dir = std::env::temp_dir().join(format!("retention-output-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("dashboard_data.csv");

    let table = MetricsTable::from_rows(vec![row(day(1), "X")]);
    table.write_csv_file(&path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, table.to_csv_string().unwrap());
    assert!(!dir.join("dashboard_data.csv.partial").exists());

    std::fs::remove_dir_all(&dir).unwrap();
}
