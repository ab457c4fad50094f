use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{DataError, DataResult};
use crate::model::{Dataset, Fixture, Player, Position, Team};
use crate::source::RemoteSource;

/// Status code the API uses for players who have left the league.
pub const UNAVAILABLE_STATUS: &str = "u";

#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    pub require_minutes: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            require_minutes: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BootstrapResponse {
    teams: Vec<RawTeam>,
    element_types: Vec<RawPosition>,
    elements: Vec<RawPlayer>,
}

#[derive(Debug, Deserialize)]
struct RawTeam {
    id: u32,
    name: String,
    short_name: String,
    strength: u8,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    id: u32,
    singular_name: String,
    singular_name_short: String,
}

#[derive(Debug, Deserialize)]
struct RawPlayer {
    id: u32,
    first_name: String,
    second_name: String,
    web_name: String,
    team: u32,
    element_type: u32,
    status: String,
    chance_of_playing_this_round: Option<u8>,
    chance_of_playing_next_round: Option<u8>,
    now_cost: u32,
    minutes: u32,
}

#[derive(Debug, Deserialize)]
struct RawFixture {
    id: u32,
    finished: bool,
    kickoff_time: Option<String>,
    team_h: u32,
    team_a: u32,
    team_h_score: Option<u8>,
    team_a_score: Option<u8>,
}

/// Reference data and retained players from `bootstrap-static/`.
#[derive(Debug, Clone, Default)]
pub struct Bootstrap {
    pub teams: BTreeMap<u32, Team>,
    pub positions: BTreeMap<u32, Position>,
    pub players: BTreeMap<u32, Player>,
}

pub fn parse_bootstrap_json(raw: &str, opts: NormalizeOptions) -> DataResult<Bootstrap> {
    let trimmed = non_empty(raw, "bootstrap")?;
    let parsed: BootstrapResponse =
        serde_json::from_str(trimmed).map_err(|err| DataError::schema("bootstrap", err))?;

    let teams: BTreeMap<u32, Team> = parsed
        .teams
        .into_iter()
        .map(|t| {
            (
                t.id,
                Team {
                    id: t.id,
                    name: t.name,
                    short_name: t.short_name,
                    strength: t.strength,
                },
            )
        })
        .collect();

    let positions: BTreeMap<u32, Position> = parsed
        .element_types
        .into_iter()
        .map(|p| {
            (
                p.id,
                Position {
                    id: p.id,
                    name: p.singular_name,
                    short_name: p.singular_name_short,
                },
            )
        })
        .collect();

    let mut players = BTreeMap::new();
    for raw_player in parsed.elements {
        if raw_player.status == UNAVAILABLE_STATUS {
            continue;
        }
        if opts.require_minutes && raw_player.minutes == 0 {
            continue;
        }
        if !teams.contains_key(&raw_player.team) {
            return Err(DataError::schema(
                "bootstrap",
                format!(
                    "player {} references unknown team {}",
                    raw_player.id, raw_player.team
                ),
            ));
        }
        if !positions.contains_key(&raw_player.element_type) {
            return Err(DataError::schema(
                "bootstrap",
                format!(
                    "player {} references unknown position {}",
                    raw_player.id, raw_player.element_type
                ),
            ));
        }
        players.insert(
            raw_player.id,
            Player {
                id: raw_player.id,
                first_name: raw_player.first_name,
                second_name: raw_player.second_name,
                name: raw_player.web_name,
                team: raw_player.team,
                position: raw_player.element_type,
                status: raw_player.status,
                chance_of_playing_this_round: raw_player.chance_of_playing_this_round,
                chance_of_playing_next_round: raw_player.chance_of_playing_next_round,
                now_cost: raw_player.now_cost,
                minutes: raw_player.minutes,
                matches: Vec::new(),
            },
        );
    }

    Ok(Bootstrap {
        teams,
        positions,
        players,
    })
}

/// Finished fixtures only, ordered by kickoff then id.
pub fn parse_fixtures_json(raw: &str) -> DataResult<Vec<Fixture>> {
    let trimmed = non_empty(raw, "fixtures")?;
    let parsed: Vec<RawFixture> =
        serde_json::from_str(trimmed).map_err(|err| DataError::schema("fixtures", err))?;

    let mut out = Vec::new();
    for f in parsed.into_iter().filter(|f| f.finished) {
        let (Some(kickoff), Some(team_h_score), Some(team_a_score)) =
            (f.kickoff_time.as_deref(), f.team_h_score, f.team_a_score)
        else {
            return Err(DataError::schema(
                "fixtures",
                format!("finished fixture {} is missing kickoff or score", f.id),
            ));
        };
        let kickoff_time = DateTime::parse_from_rfc3339(kickoff)
            .map_err(|err| DataError::schema("fixtures", format!("fixture {}: {err}", f.id)))?
            .with_timezone(&Utc);
        out.push(Fixture {
            id: f.id,
            kickoff_time,
            team_h: f.team_h,
            team_a: f.team_a,
            team_h_score,
            team_a_score,
        });
    }
    out.sort_by(|a, b| a.kickoff_time.cmp(&b.kickoff_time).then(a.id.cmp(&b.id)));
    Ok(out)
}

/// Builds a dataset (without match history) from the two league-wide payloads.
pub fn normalize(
    bootstrap_raw: &str,
    fixtures_raw: &str,
    opts: NormalizeOptions,
) -> DataResult<Dataset> {
    let bootstrap = parse_bootstrap_json(bootstrap_raw, opts)?;
    let fixtures = parse_fixtures_json(fixtures_raw)?;
    Ok(Dataset {
        teams: bootstrap.teams,
        positions: bootstrap.positions,
        players: bootstrap.players,
        fixtures,
    })
}

pub fn fetch_and_normalize(source: &dyn RemoteSource, opts: NormalizeOptions) -> DataResult<Dataset> {
    let bootstrap = source.bootstrap()?;
    let fixtures = source.fixtures()?;
    let dataset = normalize(&bootstrap, &fixtures, opts)?;
    log::info!(
        "normalized {} teams, {} positions, {} players, {} finished fixtures",
        dataset.teams.len(),
        dataset.positions.len(),
        dataset.players.len(),
        dataset.fixtures.len()
    );
    Ok(dataset)
}

pub(crate) fn non_empty<'a>(raw: &'a str, context: &str) -> DataResult<&'a str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(DataError::schema(context, "empty response"));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOTSTRAP: &str = r#"{
        "events": [],
        "teams": [{"id": 1, "name": "Arsenal", "short_name": "ARS", "strength": 4, "code": 3}],
        "element_types": [
            {"id": 1, "singular_name": "Goalkeeper", "singular_name_short": "GKP", "plural_name": "Goalkeepers"}
        ],
        "elements": [
            {"id": 10, "first_name": "David", "second_name": "Raya", "web_name": "Raya",
             "team": 1, "element_type": 1, "status": "a", "now_cost": 55, "minutes": 900,
             "chance_of_playing_this_round": null, "chance_of_playing_next_round": 100,
             "form": "5.0"},
            {"id": 11, "first_name": "Gone", "second_name": "Player", "web_name": "Gone",
             "team": 1, "element_type": 1, "status": "u", "now_cost": 40, "minutes": 90,
             "chance_of_playing_this_round": 0, "chance_of_playing_next_round": 0},
            {"id": 12, "first_name": "Bench", "second_name": "Warmer", "web_name": "Bench",
             "team": 1, "element_type": 1, "status": "a", "now_cost": 40, "minutes": 0,
             "chance_of_playing_this_round": null, "chance_of_playing_next_round": null}
        ]
    }"#;

    #[test]
    fn bootstrap_filters_unavailable_and_zero_minute_players() {
        let b = parse_bootstrap_json(BOOTSTRAP, NormalizeOptions::default()).expect("parse");
        assert_eq!(b.players.len(), 1);
        let raya = &b.players[&10];
        assert_eq!(raya.name, "Raya");
        assert_eq!(raya.position, 1);
        assert_eq!(raya.chance_of_playing_this_round, None);
        assert_eq!(raya.chance_of_playing_next_round, Some(100));
        assert_eq!(b.positions[&1].short_name, "GKP");
    }

    #[test]
    fn minute_filter_can_be_disabled() {
        let opts = NormalizeOptions {
            require_minutes: false,
        };
        let b = parse_bootstrap_json(BOOTSTRAP, opts).expect("parse");
        assert!(b.players.contains_key(&12));
        assert!(!b.players.contains_key(&11));
    }

    #[test]
    fn unknown_team_reference_is_a_schema_error() {
        let raw = BOOTSTRAP.replace("\"team\": 1, \"element_type\": 1, \"status\": \"a\", \"now_cost\": 55", "\"team\": 9, \"element_type\": 1, \"status\": \"a\", \"now_cost\": 55");
        let err = parse_bootstrap_json(&raw, NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, DataError::RemoteSchema { .. }));
    }

    #[test]
    fn missing_allow_listed_field_is_a_schema_error() {
        let raw = r#"{"teams": [{"id": 1, "name": "Arsenal", "short_name": "ARS"}],
                      "element_types": [], "elements": []}"#;
        let err = parse_bootstrap_json(raw, NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, DataError::RemoteSchema { .. }));
    }

    #[test]
    fn fixtures_keep_only_finished_sorted_by_kickoff() {
        let raw = r#"[
            {"id": 3, "finished": true, "kickoff_time": "2024-08-17T14:00:00Z",
             "team_h": 1, "team_a": 2, "team_h_score": 2, "team_a_score": 0, "event": 1},
            {"id": 1, "finished": true, "kickoff_time": "2024-08-16T19:00:00Z",
             "team_h": 2, "team_a": 1, "team_h_score": 1, "team_a_score": 1, "event": 1},
            {"id": 2, "finished": false, "kickoff_time": null,
             "team_h": 1, "team_a": 2, "team_h_score": null, "team_a_score": null, "event": null}
        ]"#;
        let fixtures = parse_fixtures_json(raw).expect("parse");
        assert_eq!(fixtures.iter().map(|f| f.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(fixtures[1].team_h_score, 2);
    }

    #[test]
    fn null_payload_is_a_schema_error() {
        assert!(matches!(
            parse_fixtures_json("null"),
            Err(DataError::RemoteSchema { .. })
        ));
    }
}
