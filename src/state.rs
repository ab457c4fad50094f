use std::collections::VecDeque;

use crate::chart::{self, Aggregation, ChartSpec, Dimensions, PlayerPoint, Selection};
use crate::history::FetchProgress;
use crate::model::{Dataset, Statistic};
use crate::pipeline::DataOrigin;
use crate::table::PlayerMatchTable;

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    Idle,
    Loading(FetchProgress),
    Ready,
    Unavailable(String),
}

pub struct AppState {
    pub dataset: Option<Dataset>,
    pub table: PlayerMatchTable,
    pub origin: Option<DataOrigin>,
    pub status: LoadStatus,
    pub statistic: Statistic,
    pub aggregation: Aggregation,
    pub position_filter: Option<String>,
    pub selection: Selection,
    pub cursor: usize,
    pub chart: Option<ChartSpec>,
    pub dims: Dimensions,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            dataset: None,
            table: PlayerMatchTable::default(),
            origin: None,
            status: LoadStatus::Idle,
            statistic: Statistic::default(),
            aggregation: Aggregation::default(),
            position_filter: None,
            selection: Selection::new(),
            cursor: 0,
            chart: None,
            dims: Dimensions::default(),
            logs: VecDeque::new(),
            help_overlay: false,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.status, LoadStatus::Loading(_))
    }

    pub fn set_dataset(&mut self, dataset: Dataset, origin: DataOrigin) {
        self.table = PlayerMatchTable::from_dataset(&dataset);
        let stale_filter = self
            .position_filter
            .as_ref()
            .is_some_and(|pos| !self.table.positions().contains(pos));
        if stale_filter {
            self.position_filter = None;
        }
        let kept: Selection = self
            .selection
            .ids()
            .filter(|id| dataset.players.contains_key(id))
            .collect();
        self.selection = kept;
        self.dataset = Some(dataset);
        self.origin = Some(origin);
        self.status = LoadStatus::Ready;
        self.rebuild_chart();
    }

    pub fn rebuild_chart(&mut self) {
        if self.dataset.is_none() {
            self.chart = None;
            return;
        }
        self.chart = Some(chart::build_from_table(
            &self.table,
            self.dims,
            self.statistic,
            self.aggregation,
            self.position_filter.as_deref(),
        ));
        let len = self.visible_players().len();
        if self.cursor >= len {
            self.cursor = len.saturating_sub(1);
        }
    }

    pub fn cycle_statistic(&mut self) {
        self.statistic = self.statistic.next();
        self.rebuild_chart();
    }

    pub fn cycle_aggregation(&mut self) {
        self.aggregation = self.aggregation.next();
        self.rebuild_chart();
    }

    /// All positions, then each position in id order, then back to all.
    pub fn cycle_position(&mut self) {
        let positions = self.table.positions();
        self.position_filter = match self.position_filter.as_ref() {
            None => positions.first().cloned(),
            Some(current) => {
                let idx = positions.iter().position(|p| p == current);
                idx.and_then(|i| positions.get(i + 1)).cloned()
            }
        };
        self.cursor = 0;
        self.rebuild_chart();
    }

    /// Players listed for selection: the filtered position, best value first.
    pub fn visible_players(&self) -> Vec<&PlayerPoint> {
        let Some(chart) = self.chart.as_ref() else {
            return Vec::new();
        };
        let mut players: Vec<&PlayerPoint> = chart
            .points
            .iter()
            .filter(|p| {
                self.position_filter
                    .as_deref()
                    .is_none_or(|pos| p.position == pos)
            })
            .collect();
        players.sort_by(|a, b| {
            b.value
                .total_cmp(&a.value)
                .then(b.sum.total_cmp(&a.sum))
                .then(a.player_id.cmp(&b.player_id))
        });
        players
    }

    pub fn cursor_player(&self) -> Option<&PlayerPoint> {
        self.visible_players().get(self.cursor).copied()
    }

    pub fn select_next(&mut self) {
        let len = self.visible_players().len();
        if len > 0 {
            self.cursor = (self.cursor + 1).min(len - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn toggle_cursor_player(&mut self) {
        let Some(id) = self.cursor_player().map(|p| p.player_id) else {
            return;
        };
        self.selection.toggle(id);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }
}

#[derive(Debug)]
pub enum Delta {
    Progress(FetchProgress),
    Loaded {
        dataset: Dataset,
        origin: DataOrigin,
        failures: usize,
    },
    Failed(String),
    Cancelled,
    Log(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCommand {
    Load { force_refresh: bool },
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::Progress(progress) => {
            state.status = LoadStatus::Loading(progress);
        }
        Delta::Loaded {
            dataset,
            origin,
            failures,
        } => {
            let players = dataset.players.len();
            match origin {
                DataOrigin::Snapshot { saved_at } => {
                    state.push_log(format!(
                        "[INFO] Loaded snapshot from {} ({players} players)",
                        saved_at.format("%Y-%m-%d %H:%M")
                    ));
                }
                DataOrigin::Remote { saved_at } => {
                    state.push_log(format!("[INFO] Fetched {players} players from the API"));
                    if saved_at.is_none() {
                        state.push_log("[WARN] Snapshot could not be written");
                    }
                }
            }
            if failures > 0 {
                state.push_log(format!(
                    "[WARN] {failures} players have no match history"
                ));
            }
            state.set_dataset(dataset, origin);
        }
        Delta::Failed(err) => {
            state.push_log(format!("[WARN] Data unavailable: {err}"));
            // Keep whatever is already on screen.
            state.status = if state.dataset.is_some() {
                LoadStatus::Ready
            } else {
                LoadStatus::Unavailable(err)
            };
        }
        Delta::Cancelled => {
            state.push_log("[INFO] Refresh cancelled");
            state.status = if state.dataset.is_some() {
                LoadStatus::Ready
            } else {
                LoadStatus::Unavailable("refresh cancelled".to_string())
            };
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}
