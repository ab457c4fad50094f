use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::model::{Dataset, Statistic, cost_millions};
use crate::table::PlayerMatchTable;

pub struct ExportReport {
    pub teams: usize,
    pub positions: usize,
    pub players: usize,
    pub fixtures: usize,
    pub player_matches: usize,
}

enum Cell {
    Text(String),
    Number(f64),
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Cell::Number(value as f64)
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names.iter().map(|n| Cell::from(*n)).collect()
}

fn opt_cell(value: Option<u8>) -> Cell {
    match value {
        Some(v) => Cell::Number(v as f64),
        None => Cell::Text(String::new()),
    }
}

/// Writes the dataset and its long-form table as one workbook.
pub fn export_dataset(path: &Path, dataset: &Dataset) -> Result<ExportReport> {
    let mut teams_rows = vec![header(&["Team ID", "Team", "Short", "Strength"])];
    for team in dataset.teams.values() {
        teams_rows.push(vec![
            team.id.into(),
            team.name.clone().into(),
            team.short_name.clone().into(),
            u32::from(team.strength).into(),
        ]);
    }

    let mut positions_rows = vec![header(&["Position ID", "Position", "Short"])];
    for position in dataset.positions.values() {
        positions_rows.push(vec![
            position.id.into(),
            position.name.clone().into(),
            position.short_name.clone().into(),
        ]);
    }

    let mut players_rows = vec![header(&[
        "Player ID",
        "Name",
        "First Name",
        "Second Name",
        "Team",
        "Position",
        "Status",
        "Chance This Round",
        "Chance Next Round",
        "Cost",
        "Minutes",
        "Matches",
    ])];
    for player in dataset.players.values() {
        players_rows.push(vec![
            player.id.into(),
            player.name.clone().into(),
            player.first_name.clone().into(),
            player.second_name.clone().into(),
            dataset.team_name(player.team).unwrap_or("-").into(),
            dataset.position_name(player.position).unwrap_or("-").into(),
            player.status.clone().into(),
            opt_cell(player.chance_of_playing_this_round),
            opt_cell(player.chance_of_playing_next_round),
            cost_millions(player.now_cost).into(),
            player.minutes.into(),
            (player.matches.len() as u32).into(),
        ]);
    }

    let mut fixtures_rows = vec![header(&[
        "Fixture ID",
        "Kickoff (UTC)",
        "Home",
        "Away",
        "Home Score",
        "Away Score",
    ])];
    for fixture in &dataset.fixtures {
        fixtures_rows.push(vec![
            fixture.id.into(),
            fixture
                .kickoff_time
                .format("%Y-%m-%d %H:%M")
                .to_string()
                .into(),
            dataset.team_name(fixture.team_h).unwrap_or("-").into(),
            dataset.team_name(fixture.team_a).unwrap_or("-").into(),
            u32::from(fixture.team_h_score).into(),
            u32::from(fixture.team_a_score).into(),
        ]);
    }

    let table = PlayerMatchTable::from_dataset(dataset);
    let mut match_header = vec!["Player ID", "Name", "Team", "Position", "Round"];
    match_header.extend(Statistic::ALL.iter().map(|s| s.key()));
    let mut match_rows = vec![header(&match_header)];
    for row in table.rows() {
        let mut cells: Vec<Cell> = vec![
            row.player_id.into(),
            row.name.clone().into(),
            row.team.clone().into(),
            row.position.clone().into(),
            row.round().into(),
        ];
        cells.extend(Statistic::ALL.iter().map(|s| Cell::Number(row.stat(*s))));
        match_rows.push(cells);
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Teams")?;
        write_rows(sheet, &teams_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Positions")?;
        write_rows(sheet, &positions_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Players")?;
        write_rows(sheet, &players_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Fixtures")?;
        write_rows(sheet, &fixtures_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("PlayerMatches")?;
        write_rows(sheet, &match_rows)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        teams: teams_rows.len().saturating_sub(1),
        positions: positions_rows.len().saturating_sub(1),
        players: players_rows.len().saturating_sub(1),
        fixtures: fixtures_rows.len().saturating_sub(1),
        player_matches: match_rows.len().saturating_sub(1),
    })
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<Cell>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            let (r, c) = (row_idx as u32, col_idx as u16);
            let written = match value {
                Cell::Text(text) => worksheet.write_string(r, c, text),
                Cell::Number(number) => worksheet.write_number(r, c, *number),
            };
            written.with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
