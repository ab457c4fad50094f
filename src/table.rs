use crate::model::{Dataset, MatchRecord, Statistic, cost_millions};

const UNKNOWN: &str = "Unknown";

/// One (player, round) observation with team and position already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMatchRow {
    pub player_id: u32,
    pub name: String,
    pub team: String,
    pub position: String,
    pub position_id: u32,
    pub record: MatchRecord,
}

impl PlayerMatchRow {
    pub fn round(&self) -> u32 {
        self.record.round
    }

    pub fn stat(&self, statistic: Statistic) -> f64 {
        self.record.stat(statistic)
    }

    /// Market cost at this round, in millions.
    pub fn cost(&self) -> f64 {
        cost_millions(self.record.value)
    }
}

/// Long-form view of a dataset, ordered by player id then round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerMatchTable {
    rows: Vec<PlayerMatchRow>,
    positions: Vec<String>,
}

impl PlayerMatchTable {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut rows = Vec::with_capacity(dataset.match_count());
        for player in dataset.players.values() {
            let team = dataset.team_name(player.team).unwrap_or(UNKNOWN);
            let position = dataset.position_name(player.position).unwrap_or(UNKNOWN);
            let mut matches: Vec<&MatchRecord> = player.matches.iter().collect();
            matches.sort_by_key(|m| m.round);
            for record in matches {
                rows.push(PlayerMatchRow {
                    player_id: player.id,
                    name: player.name.clone(),
                    team: team.to_string(),
                    position: position.to_string(),
                    position_id: player.position,
                    record: record.clone(),
                });
            }
        }
        Self {
            rows,
            positions: dataset.position_names(),
        }
    }

    pub fn from_rows(mut rows: Vec<PlayerMatchRow>, positions: Vec<String>) -> Self {
        rows.sort_by_key(|r| (r.player_id, r.record.round));
        Self { rows, positions }
    }

    pub fn rows(&self) -> &[PlayerMatchRow] {
        &self.rows
    }

    /// Position names in id order; used as facet order.
    pub fn positions(&self) -> &[String] {
        &self.positions
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn max_round(&self) -> u32 {
        self.rows.iter().map(|r| r.record.round).max().unwrap_or(0)
    }

    /// Rows grouped per player, each group ascending by round.
    pub fn by_player(&self) -> Vec<&[PlayerMatchRow]> {
        self.rows
            .chunk_by(|a, b| a.player_id == b.player_id)
            .collect()
    }
}
