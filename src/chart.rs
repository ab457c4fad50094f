use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Value, json};

use crate::model::{Dataset, Statistic};
use crate::table::{PlayerMatchRow, PlayerMatchTable};

/// Rounds averaged by the form aggregation, current round included.
pub const FORM_WINDOW: usize = 4;

const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";
const SELECTION_PARAM: &str = "pick";
const NUMBER_FORMAT: &str = " .2~s";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Aggregation {
    #[default]
    Weekly,
    Cumulative,
    Form,
}

impl Aggregation {
    pub const ALL: [Aggregation; 3] = [
        Aggregation::Weekly,
        Aggregation::Cumulative,
        Aggregation::Form,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Aggregation::Weekly => "weekly",
            Aggregation::Cumulative => "cumulative",
            Aggregation::Form => "form",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Aggregation::Weekly => "Weekly",
            Aggregation::Cumulative => "Cumulative",
            Aggregation::Form => "Form",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Aggregation::Weekly => Aggregation::Cumulative,
            Aggregation::Cumulative => Aggregation::Form,
            Aggregation::Form => Aggregation::Weekly,
        }
    }

    /// Applies this aggregation to one player's values, already ordered by round.
    pub fn apply(self, values: &[f64]) -> Vec<f64> {
        match self {
            Aggregation::Weekly => values.to_vec(),
            Aggregation::Cumulative => cumulative(values),
            Aggregation::Form => trailing_mean(values, FORM_WINDOW),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Aggregation::ALL
            .into_iter()
            .find(|a| a.key() == key)
            .ok_or_else(|| format!("unknown aggregation `{s}` (weekly, cumulative, form)"))
    }
}

/// Pixel sizes chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub height: u32,
    pub width_points: u32,
    pub width_lines: u32,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            height: 225,
            width_points: 275,
            width_lines: 1100,
        }
    }
}

impl Dimensions {
    /// Each facet takes ~a fifth of the width, the line view most of it.
    pub fn from_viewport(width: u32, height: u32) -> Self {
        Self {
            height: (height as f64 * 0.4).round() as u32,
            width_points: (width as f64 * 0.215).round() as u32,
            width_lines: (width as f64 * 0.9).round() as u32,
        }
    }

    /// Parses a `WIDTHxHEIGHT` viewport such as `1280x800`.
    pub fn parse_viewport(raw: &str) -> Option<Self> {
        let (w, h) = raw.trim().to_ascii_lowercase().split_once('x').map(|(w, h)| {
            (w.trim().parse::<u32>().ok(), h.trim().parse::<u32>().ok())
        })?;
        match (w?, h?) {
            (0, _) | (_, 0) => None,
            (w, h) => Some(Self::from_viewport(w, h)),
        }
    }
}

/// Player ids picked in the aggregate view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection(BTreeSet<u32>);

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, player_id: u32) {
        if !self.0.remove(&player_id) {
            self.0.insert(player_id);
        }
    }

    pub fn insert(&mut self, player_id: u32) {
        self.0.insert(player_id);
    }

    pub fn contains(&self, player_id: u32) -> bool {
        self.0.contains(&player_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<u32> for Selection {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One dot of the aggregate scatter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerPoint {
    pub player_id: u32,
    pub name: String,
    pub team: String,
    pub position: String,
    pub matches: usize,
    pub sum: f64,
    pub variance: f64,
    pub latest_round: u32,
    pub latest_cost: f64,
    pub value: f64,
}

/// One vertex of a player's per-round line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinePoint {
    pub player_id: u32,
    pub name: String,
    pub position: String,
    pub round: u32,
    pub minutes: u32,
    pub raw: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub statistic: Statistic,
    pub aggregation: Aggregation,
    pub position_filter: Option<String>,
    pub dims: Dimensions,
    pub facets: Vec<String>,
    pub points: Vec<PlayerPoint>,
    pub lines: Vec<LinePoint>,
    pub x_domain: (u32, u32),
    pub y_domain: (f64, f64),
}

pub fn build(
    dataset: &Dataset,
    dims: Dimensions,
    statistic: Statistic,
    aggregation: Aggregation,
    position_filter: Option<&str>,
) -> ChartSpec {
    let table = PlayerMatchTable::from_dataset(dataset);
    build_from_table(&table, dims, statistic, aggregation, position_filter)
}

/// The position filter narrows the line view only; the scatter always covers every position.
pub fn build_from_table(
    table: &PlayerMatchTable,
    dims: Dimensions,
    statistic: Statistic,
    aggregation: Aggregation,
    position_filter: Option<&str>,
) -> ChartSpec {
    let groups = table.by_player();

    let points: Vec<PlayerPoint> = groups
        .iter()
        .filter_map(|rows| aggregate_player(rows, statistic))
        .collect();

    let mut lines = Vec::new();
    for rows in &groups {
        let Some(first) = rows.first() else {
            continue;
        };
        if position_filter.is_some_and(|pos| first.position != pos) {
            continue;
        }
        let values: Vec<f64> = rows.iter().map(|r| r.stat(statistic)).collect();
        let ys = aggregation.apply(&values);
        for ((row, raw), y) in rows.iter().zip(values).zip(ys) {
            lines.push(LinePoint {
                player_id: row.player_id,
                name: row.name.clone(),
                position: row.position.clone(),
                round: row.round(),
                minutes: row.record.minutes,
                raw,
                y,
            });
        }
    }

    let y_max = lines.iter().map(|l| l.y).fold(0.0_f64, f64::max);
    let y_min = lines.iter().map(|l| l.y).fold(0.0_f64, f64::min);

    ChartSpec {
        statistic,
        aggregation,
        position_filter: position_filter.map(str::to_string),
        dims,
        facets: table.positions().to_vec(),
        points,
        lines,
        x_domain: (1, table.max_round().max(1)),
        y_domain: (y_min, y_max),
    }
}

fn aggregate_player(rows: &[PlayerMatchRow], statistic: Statistic) -> Option<PlayerPoint> {
    let first = rows.first()?;
    let latest = rows.iter().max_by_key(|r| r.round())?;
    let values: Vec<f64> = rows.iter().map(|r| r.stat(statistic)).collect();
    let sum: f64 = values.iter().sum();
    let latest_cost = latest.cost();
    Some(PlayerPoint {
        player_id: first.player_id,
        name: first.name.clone(),
        team: first.team.clone(),
        position: first.position.clone(),
        matches: rows.len(),
        sum,
        variance: sample_variance(&values),
        latest_round: latest.round(),
        latest_cost,
        value: if latest_cost > 0.0 { sum / latest_cost } else { 0.0 },
    })
}

pub fn cumulative(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

/// Mean of the last `window` values ending at each index.
pub fn trailing_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Sample variance (n - 1); zero below two observations.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
}

impl ChartSpec {
    pub fn stat_title(&self) -> String {
        self.statistic.title()
    }

    pub fn line_title(&self) -> String {
        match self.aggregation {
            Aggregation::Weekly => self.stat_title(),
            other => format!("{} {}", other.label(), self.stat_title()),
        }
    }

    pub fn points_for_position<'a>(
        &'a self,
        position: &'a str,
    ) -> impl Iterator<Item = &'a PlayerPoint> + 'a {
        self.points.iter().filter(move |p| p.position == position)
    }

    /// Line vertices of selected players; nothing when the selection is empty.
    pub fn selected_lines(&self, selection: &Selection) -> Vec<&LinePoint> {
        if selection.is_empty() {
            return Vec::new();
        }
        self.lines
            .iter()
            .filter(|l| selection.contains(l.player_id))
            .collect()
    }

    /// `(player_id, name, [(round, y)])` for each selected player with line data.
    pub fn selected_series(&self, selection: &Selection) -> Vec<(u32, String, Vec<(f64, f64)>)> {
        let mut out: Vec<(u32, String, Vec<(f64, f64)>)> = Vec::new();
        for line in self.selected_lines(selection) {
            match out.last_mut() {
                Some((id, _, pts)) if *id == line.player_id => {
                    pts.push((line.round as f64, line.y));
                }
                _ => out.push((
                    line.player_id,
                    line.name.clone(),
                    vec![(line.round as f64, line.y)],
                )),
            }
        }
        out
    }

    /// Vega-Lite v5 document: faceted scatter above the per-round lines, cross-filtered by clicks.
    pub fn to_vega_lite(&self) -> Value {
        let stat_title = self.stat_title();
        let points = json!({
            "data": { "values": self.points },
            "facet": {
                "column": {
                    "field": "position",
                    "type": "ordinal",
                    "sort": self.facets,
                    "title": null
                }
            },
            "spec": {
                "width": self.dims.width_points,
                "height": self.dims.height,
                "params": [{
                    "name": SELECTION_PARAM,
                    "select": { "type": "point", "fields": ["player_id"], "toggle": true }
                }],
                "mark": "circle",
                "encoding": {
                    "x": {
                        "field": "sum",
                        "type": "quantitative",
                        "axis": { "format": NUMBER_FORMAT },
                        "title": stat_title
                    },
                    "y": {
                        "field": "variance",
                        "type": "quantitative",
                        "axis": { "labels": false, "ticks": false },
                        "title": "Inconsistency"
                    },
                    "opacity": {
                        "condition": { "param": SELECTION_PARAM, "empty": false, "value": 1.0 },
                        "field": "value",
                        "type": "quantitative",
                        "legend": null
                    },
                    "color": {
                        "condition": { "param": SELECTION_PARAM, "empty": false, "value": "red" },
                        "field": "value",
                        "type": "quantitative",
                        "legend": null,
                        "sort": "descending"
                    },
                    "tooltip": [
                        { "field": "name", "type": "nominal", "title": "Name" },
                        { "field": "sum", "type": "quantitative", "title": stat_title },
                        { "field": "variance", "type": "quantitative", "format": NUMBER_FORMAT, "title": "Inconsistency" },
                        { "field": "value", "type": "quantitative", "format": NUMBER_FORMAT, "title": "Value" },
                        { "field": "latest_cost", "type": "quantitative", "title": "Cost" }
                    ]
                }
            }
        });

        let lines = json!({
            "data": { "values": self.lines },
            "width": self.dims.width_lines,
            "height": self.dims.height,
            "mark": { "type": "line", "point": true },
            "transform": [{ "filter": { "param": SELECTION_PARAM, "empty": false } }],
            "encoding": {
                "x": {
                    "field": "round",
                    "type": "quantitative",
                    "axis": { "tickMinStep": 1 },
                    "scale": { "domain": [self.x_domain.0, self.x_domain.1] },
                    "title": "Matchday"
                },
                "y": {
                    "field": "y",
                    "type": "quantitative",
                    "axis": { "format": NUMBER_FORMAT },
                    "scale": { "domain": [self.y_domain.0, self.y_domain.1] },
                    "title": stat_title
                },
                "color": { "field": "name", "type": "nominal", "title": "Name" },
                // One polyline per player, even when display names collide.
                "detail": { "field": "player_id", "type": "nominal" },
                "tooltip": [
                    { "field": "y", "type": "quantitative", "format": NUMBER_FORMAT, "title": self.line_title() },
                    { "field": "minutes", "type": "quantitative", "title": "Minutes" }
                ]
            }
        });

        json!({
            "$schema": VEGA_LITE_SCHEMA,
            "background": "#FFF0",
            "vconcat": [points, lines],
            "config": {
                "axis": { "grid": false, "labelColor": "lightgrey", "titleColor": "lightgrey" },
                "header": { "labelColor": "lightgrey" },
                "view": { "strokeWidth": 0 },
                "legend": { "labelColor": "lightgrey", "titleColor": "lightgrey", "orient": "top-right" }
            }
        })
    }
}
