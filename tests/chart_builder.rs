mod common;

use fpl_dashboard::chart::{self, Aggregation, Dimensions, Selection, build_from_table};
use fpl_dashboard::history::CancelToken;
use fpl_dashboard::model::{MatchRecord, Statistic};
use fpl_dashboard::pipeline::run_pipeline;
use fpl_dashboard::table::{PlayerMatchRow, PlayerMatchTable};

use common::{FixtureSource, fast_options};

const POSITIONS: [&str; 4] = ["Goalkeeper", "Defender", "Midfielder", "Forward"];

fn row(player_id: u32, name: &str, position: &str, round: u32, points: i32, value: u32) -> PlayerMatchRow {
    let position_id = POSITIONS.iter().position(|p| *p == position).unwrap() as u32 + 1;
    PlayerMatchRow {
        player_id,
        name: name.to_string(),
        team: "Arsenal".to_string(),
        position: position.to_string(),
        position_id,
        record: MatchRecord {
            round,
            minutes: 90,
            total_points: points,
            value,
            ..MatchRecord::default()
        },
    }
}

fn table() -> PlayerMatchTable {
    let rows = vec![
        row(1, "Keeper", "Goalkeeper", 1, 2, 50),
        row(1, "Keeper", "Goalkeeper", 2, 5, 50),
        row(1, "Keeper", "Goalkeeper", 3, 0, 50),
        row(1, "Keeper", "Goalkeeper", 4, 8, 50),
        row(2, "Steady", "Defender", 1, 3, 45),
        row(2, "Steady", "Defender", 2, 3, 45),
        row(2, "Steady", "Defender", 3, 3, 45),
        row(3, "Striker", "Forward", 2, 10, 90),
        row(3, "Striker", "Forward", 1, 4, 88),
        row(4, "Free", "Midfielder", 1, 6, 0),
    ];
    PlayerMatchTable::from_rows(rows, POSITIONS.iter().map(|p| p.to_string()).collect())
}

fn build(aggregation: Aggregation, position: Option<&str>) -> chart::ChartSpec {
    build_from_table(
        &table(),
        Dimensions::default(),
        Statistic::TotalPoints,
        aggregation,
        position,
    )
}

#[test]
fn cumulative_lines_are_running_totals() {
    let spec = build(Aggregation::Cumulative, None);
    let ys: Vec<f64> = spec
        .lines
        .iter()
        .filter(|l| l.player_id == 1)
        .map(|l| l.y)
        .collect();
    assert_eq!(ys, vec![2.0, 7.0, 7.0, 15.0]);
    assert_eq!(spec.y_domain, (0.0, 15.0));
    assert_eq!(spec.x_domain, (1, 4));
}

#[test]
fn form_lines_average_recent_rounds() {
    let spec = build(Aggregation::Form, None);
    let ys: Vec<f64> = spec
        .lines
        .iter()
        .filter(|l| l.player_id == 3)
        .map(|l| l.y)
        .collect();
    assert_eq!(ys, vec![4.0, 7.0]);
}

#[test]
fn constant_player_has_zero_variance() {
    let spec = build(Aggregation::Weekly, None);
    let steady = spec.points.iter().find(|p| p.player_id == 2).unwrap();
    assert_eq!(steady.sum, 9.0);
    assert_eq!(steady.variance, 0.0);
    assert_eq!(steady.matches, 3);
}

#[test]
fn value_uses_latest_cost() {
    let spec = build(Aggregation::Weekly, None);
    let striker = spec.points.iter().find(|p| p.player_id == 3).unwrap();
    assert_eq!(striker.latest_round, 2);
    assert_eq!(striker.latest_cost, 9.0);
    assert!((striker.value - 14.0 / 9.0).abs() < 1e-9);

    let free = spec.points.iter().find(|p| p.player_id == 4).unwrap();
    assert_eq!(free.value, 0.0);
}

#[test]
fn position_filter_narrows_lines_but_not_points() {
    let spec = build(Aggregation::Weekly, Some("Goalkeeper"));
    assert_eq!(spec.points.len(), 4);
    assert!(spec.lines.iter().all(|l| l.position == "Goalkeeper"));
    assert_eq!(spec.lines.len(), 4);
    assert_eq!(spec.facets, POSITIONS.iter().map(|p| p.to_string()).collect::<Vec<_>>());
}

#[test]
fn unknown_position_shows_no_lines() {
    let spec = build(Aggregation::Weekly, Some("Manager"));
    assert!(spec.lines.is_empty());
    assert_eq!(spec.points.len(), 4);
}

#[test]
fn empty_selection_shows_no_lines() {
    let spec = build(Aggregation::Weekly, None);
    assert!(spec.selected_lines(&Selection::new()).is_empty());
    assert!(spec.selected_series(&Selection::new()).is_empty());

    let picked: Selection = [1, 3].into_iter().collect();
    let series = spec.selected_series(&picked);
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].0, 1);
    assert_eq!(series[1].2, vec![(1.0, 4.0), (2.0, 10.0)]);
}

#[test]
fn vega_lite_document_links_views_by_player() {
    let spec = build(Aggregation::Cumulative, Some("Forward"));
    let doc = spec.to_vega_lite();
    assert_eq!(doc["$schema"], "https://vega.github.io/schema/vega-lite/v5.json");
    let points = &doc["vconcat"][0];
    let lines = &doc["vconcat"][1];
    assert_eq!(points["facet"]["column"]["field"], "position");
    assert_eq!(points["spec"]["params"][0]["select"]["fields"][0], "player_id");
    assert_eq!(lines["transform"][0]["filter"]["empty"], false);
    assert_eq!(lines["data"]["values"].as_array().unwrap().len(), 2);
    assert_eq!(lines["encoding"]["x"]["scale"]["domain"][1], 4);
}

#[test]
fn chart_from_fetched_dataset_covers_every_player() {
    let (dataset, _) = run_pipeline(
        &FixtureSource::new(),
        &fast_options(),
        &CancelToken::new(),
        &|_| {},
    )
    .expect("pipeline");
    let spec = chart::build(
        &dataset,
        Dimensions::default(),
        Statistic::Value,
        Aggregation::Weekly,
        None,
    );
    assert_eq!(spec.points.len(), 4);
    assert_eq!(spec.facets, vec!["Goalkeeper", "Defender", "Midfielder", "Forward"]);
    let salah = spec.points.iter().find(|p| p.player_id == 3).unwrap();
    assert_eq!(salah.latest_cost, 13.1);
    assert_eq!(salah.matches, 3);
}

#[test]
fn players_sharing_a_name_keep_separate_lines() {
    let rows = vec![
        row(10, "Gabriel", "Defender", 1, 6, 60),
        row(10, "Gabriel", "Defender", 2, 2, 60),
        row(11, "Gabriel", "Forward", 1, 1, 70),
        row(11, "Gabriel", "Forward", 2, 9, 70),
    ];
    let table = PlayerMatchTable::from_rows(rows, POSITIONS.iter().map(|p| p.to_string()).collect());
    let spec = build_from_table(
        &table,
        Dimensions::default(),
        Statistic::TotalPoints,
        Aggregation::Weekly,
        None,
    );

    let picked: Selection = [10, 11].into_iter().collect();
    let series = spec.selected_series(&picked);
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].2, vec![(1.0, 6.0), (2.0, 2.0)]);
    assert_eq!(series[1].2, vec![(1.0, 1.0), (2.0, 9.0)]);

    let doc = spec.to_vega_lite();
    let encoding = &doc["vconcat"][1]["encoding"];
    assert_eq!(encoding["detail"]["field"], "player_id");
    assert_eq!(encoding["detail"]["type"], "nominal");
}
