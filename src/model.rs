use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: u32,
    pub name: String,
    pub short_name: String,
    pub strength: u8,
}

/// Open reference data; the API decides how many positions exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: u32,
    pub name: String,
    pub short_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: u32,
    pub first_name: String,
    pub second_name: String,
    pub name: String,
    pub team: u32,
    pub position: u32,
    pub status: String,
    pub chance_of_playing_this_round: Option<u8>,
    pub chance_of_playing_next_round: Option<u8>,
    // Tenths of a million, as the API reports it.
    pub now_cost: u32,
    pub minutes: u32,
    pub matches: Vec<MatchRecord>,
}

impl Player {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.second_name)
    }
}

/// One player's line for one round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub round: u32,
    pub minutes: u32,
    pub total_points: i32,
    pub goals_scored: u32,
    pub assists: u32,
    pub clean_sheets: u32,
    pub goals_conceded: u32,
    pub own_goals: u32,
    pub penalties_saved: u32,
    pub penalties_missed: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
    pub saves: u32,
    pub bonus: u32,
    pub bps: i32,
    pub value: u32,
    pub selected: u64,
}

impl MatchRecord {
    pub fn stat(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::TotalPoints => self.total_points as f64,
            Statistic::Minutes => self.minutes as f64,
            Statistic::GoalsScored => self.goals_scored as f64,
            Statistic::Assists => self.assists as f64,
            Statistic::CleanSheets => self.clean_sheets as f64,
            Statistic::GoalsConceded => self.goals_conceded as f64,
            Statistic::OwnGoals => self.own_goals as f64,
            Statistic::PenaltiesSaved => self.penalties_saved as f64,
            Statistic::PenaltiesMissed => self.penalties_missed as f64,
            Statistic::YellowCards => self.yellow_cards as f64,
            Statistic::RedCards => self.red_cards as f64,
            Statistic::Saves => self.saves as f64,
            Statistic::Bonus => self.bonus as f64,
            Statistic::Bps => self.bps as f64,
            Statistic::Value => cost_millions(self.value),
            Statistic::Selected => self.selected as f64,
        }
    }
}

pub fn cost_millions(tenths: u32) -> f64 {
    tenths as f64 / 10.0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: u32,
    pub kickoff_time: DateTime<Utc>,
    pub team_h: u32,
    pub team_a: u32,
    pub team_h_score: u8,
    pub team_a_score: u8,
}

/// Match-record fields a chart can plot.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Statistic {
    #[default]
    TotalPoints,
    Minutes,
    GoalsScored,
    Assists,
    CleanSheets,
    GoalsConceded,
    OwnGoals,
    PenaltiesSaved,
    PenaltiesMissed,
    YellowCards,
    RedCards,
    Saves,
    Bonus,
    Bps,
    Value,
    Selected,
}

impl Statistic {
    pub const ALL: [Statistic; 16] = [
        Statistic::TotalPoints,
        Statistic::Minutes,
        Statistic::GoalsScored,
        Statistic::Assists,
        Statistic::CleanSheets,
        Statistic::GoalsConceded,
        Statistic::OwnGoals,
        Statistic::PenaltiesSaved,
        Statistic::PenaltiesMissed,
        Statistic::YellowCards,
        Statistic::RedCards,
        Statistic::Saves,
        Statistic::Bonus,
        Statistic::Bps,
        Statistic::Value,
        Statistic::Selected,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Statistic::TotalPoints => "total_points",
            Statistic::Minutes => "minutes",
            Statistic::GoalsScored => "goals_scored",
            Statistic::Assists => "assists",
            Statistic::CleanSheets => "clean_sheets",
            Statistic::GoalsConceded => "goals_conceded",
            Statistic::OwnGoals => "own_goals",
            Statistic::PenaltiesSaved => "penalties_saved",
            Statistic::PenaltiesMissed => "penalties_missed",
            Statistic::YellowCards => "yellow_cards",
            Statistic::RedCards => "red_cards",
            Statistic::Saves => "saves",
            Statistic::Bonus => "bonus",
            Statistic::Bps => "bps",
            Statistic::Value => "value",
            Statistic::Selected => "selected",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Statistic::ALL.into_iter().find(|s| s.key() == key)
    }

    /// "goals_scored" -> "Goals Scored".
    pub fn title(self) -> String {
        self.key()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn next(self) -> Self {
        let idx = Statistic::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Statistic::ALL[(idx + 1) % Statistic::ALL.len()]
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatistic(pub String);

impl fmt::Display for UnknownStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown statistic `{}`", self.0)
    }
}

impl std::error::Error for UnknownStatistic {}

impl FromStr for Statistic {
    type Err = UnknownStatistic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Statistic::from_key(s.trim()).ok_or_else(|| UnknownStatistic(s.to_string()))
    }
}

/// Everything one pipeline run produces.
///
/// Carries no timestamp: two runs over identical payloads serialize to identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub teams: BTreeMap<u32, Team>,
    pub positions: BTreeMap<u32, Position>,
    pub players: BTreeMap<u32, Player>,
    pub fixtures: Vec<Fixture>,
}

impl Dataset {
    pub fn team_name(&self, id: u32) -> Option<&str> {
        self.teams.get(&id).map(|t| t.name.as_str())
    }

    pub fn position_name(&self, id: u32) -> Option<&str> {
        self.positions.get(&id).map(|p| p.name.as_str())
    }

    pub fn position_names(&self) -> Vec<String> {
        self.positions.values().map(|p| p.name.clone()).collect()
    }

    pub fn match_count(&self) -> usize {
        self.players.values().map(|p| p.matches.len()).sum()
    }

    pub fn max_round(&self) -> u32 {
        self.players
            .values()
            .flat_map(|p| p.matches.iter().map(|m| m.round))
            .max()
            .unwrap_or(0)
    }

    /// Id-keyed nested maps (`teams`, `positions`, `players` with `matches` by round).
    pub fn to_nested_json(&self) -> Value {
        let teams: Map<String, Value> = self
            .teams
            .iter()
            .map(|(id, t)| {
                (
                    id.to_string(),
                    json!({ "name": t.name, "short_name": t.short_name, "strength": t.strength }),
                )
            })
            .collect();
        let positions: Map<String, Value> = self
            .positions
            .iter()
            .map(|(id, p)| {
                (
                    id.to_string(),
                    json!({ "name": p.name, "short_name": p.short_name }),
                )
            })
            .collect();
        let players: Map<String, Value> = self
            .players
            .iter()
            .map(|(id, p)| {
                let matches: Map<String, Value> = p
                    .matches
                    .iter()
                    .map(|m| {
                        let mut stats = Map::new();
                        for statistic in Statistic::ALL {
                            stats.insert(statistic.key().to_string(), json!(m.stat(statistic)));
                        }
                        (m.round.to_string(), Value::Object(stats))
                    })
                    .collect();
                (
                    id.to_string(),
                    json!({
                        "first_name": p.first_name,
                        "second_name": p.second_name,
                        "name": p.name,
                        "team": p.team,
                        "position": p.position,
                        "status": p.status,
                        "chance_of_playing_this_round": p.chance_of_playing_this_round,
                        "chance_of_playing_next_round": p.chance_of_playing_next_round,
                        "matches": matches,
                    }),
                )
            })
            .collect();
        let fixtures: Vec<Value> = self
            .fixtures
            .iter()
            .map(|f| {
                json!({
                    "id": f.id,
                    "kickoff_time": f.kickoff_time.to_rfc3339(),
                    "team_h": f.team_h,
                    "team_a": f.team_a,
                    "team_h_score": f.team_h_score,
                    "team_a_score": f.team_a_score,
                })
            })
            .collect();
        json!({
            "teams": teams,
            "positions": positions,
            "players": players,
            "fixtures": fixtures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistic_keys_round_trip_through_from_str() {
        for statistic in Statistic::ALL {
            assert_eq!(statistic.key().parse::<Statistic>(), Ok(statistic));
        }
        assert!("xg".parse::<Statistic>().is_err());
    }

    #[test]
    fn statistic_titles_are_capitalized_words() {
        assert_eq!(Statistic::TotalPoints.title(), "Total Points");
        assert_eq!(Statistic::Bps.title(), "Bps");
    }

    #[test]
    fn statistic_next_wraps_around() {
        assert_eq!(Statistic::Selected.next(), Statistic::TotalPoints);
        assert_eq!(Statistic::TotalPoints.next(), Statistic::Minutes);
    }
}
