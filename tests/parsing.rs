mod common;

use fpl_dashboard::error::DataError;
use fpl_dashboard::export::export_dataset;
use fpl_dashboard::history::{CancelToken, parse_history_json};
use fpl_dashboard::normalize::{NormalizeOptions, parse_bootstrap_json, parse_fixtures_json};
use fpl_dashboard::pipeline::run_pipeline;

use common::{BOOTSTRAP, FIXTURES, FixtureSource, fast_options, history_fixture};

#[test]
fn recorded_bootstrap_parses() {
    let bootstrap = parse_bootstrap_json(BOOTSTRAP, NormalizeOptions::default()).expect("parse");
    assert_eq!(bootstrap.teams[&2].short_name, "LIV");
    assert_eq!(bootstrap.positions[&4].short_name, "FWD");
    let haaland = &bootstrap.players[&4];
    assert_eq!(haaland.name, "Haaland");
    assert_eq!(haaland.full_name(), "Erling Haaland");
    assert_eq!(haaland.chance_of_playing_next_round, Some(75));
    assert_eq!(bootstrap.players[&1].chance_of_playing_this_round, None);
}

#[test]
fn recorded_histories_parse() {
    for id in 1..=4 {
        let raw = history_fixture(id).expect("fixture");
        let matches = parse_history_json(raw, id).expect("parse");
        assert!(!matches.is_empty());
        assert!(matches.windows(2).all(|w| w[0].round < w[1].round));
        assert!(matches.iter().all(|m| m.minutes > 0));
    }
}

#[test]
fn history_for_wrong_player_is_rejected() {
    let raw = history_fixture(1).expect("fixture");
    let err = parse_history_json(raw, 2).expect_err("mismatch");
    assert!(matches!(err, DataError::RemoteSchema { .. }));
}

#[test]
fn empty_history_list_is_valid() {
    let matches =
        parse_history_json(r#"{"fixtures": [], "history": [], "history_past": []}"#, 7)
            .expect("parse");
    assert!(matches.is_empty());
}

#[test]
fn finished_fixture_without_score_is_rejected() {
    let raw = r#"[{"id": 1, "finished": true, "kickoff_time": "2024-08-17T14:00:00Z",
        "team_h": 1, "team_a": 2, "team_h_score": null, "team_a_score": 0}]"#;
    let err = parse_fixtures_json(raw).expect_err("missing score");
    assert!(err.to_string().contains("fixture 1"));
}

#[test]
fn recorded_fixtures_parse() {
    let fixtures = parse_fixtures_json(FIXTURES).expect("parse");
    assert_eq!(fixtures.len(), 3);
    assert!(
        fixtures
            .windows(2)
            .all(|w| w[0].kickoff_time <= w[1].kickoff_time)
    );
}

#[test]
fn nested_json_keys_players_and_rounds_by_id() {
    let (dataset, _) = run_pipeline(
        &FixtureSource::new(),
        &fast_options(),
        &CancelToken::new(),
        &|_| {},
    )
    .expect("pipeline");
    let nested = dataset.to_nested_json();
    assert_eq!(nested["teams"]["3"]["name"], "Man City");
    assert_eq!(nested["players"]["3"]["matches"]["2"]["total_points"], 13.0);
    assert_eq!(nested["players"]["3"]["matches"]["2"]["value"], 13.1);
    assert!(nested["players"]["4"]["matches"].get("2").is_none());
    assert_eq!(nested["fixtures"].as_array().map(Vec::len), Some(3));
}

#[test]
fn workbook_export_counts_rows() {
    let (dataset, _) = run_pipeline(
        &FixtureSource::new(),
        &fast_options(),
        &CancelToken::new(),
        &|_| {},
    )
    .expect("pipeline");
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("fpl.xlsx");
    let report = export_dataset(&path, &dataset).expect("export");
    assert_eq!(report.teams, 3);
    assert_eq!(report.positions, 4);
    assert_eq!(report.players, 4);
    assert_eq!(report.fixtures, 3);
    assert_eq!(report.player_matches, 11);
    assert!(path.exists());
}
