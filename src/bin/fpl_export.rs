use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;

use fpl_dashboard::config::{self, Settings};
use fpl_dashboard::history::CancelToken;
use fpl_dashboard::{export, logging, pipeline};

fn main() -> Result<()> {
    logging::init_cli("info");
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut settings = Settings::from_env();
    if let Some(path) = config::arg_value(&args, "snapshot") {
        settings.snapshot_path = PathBuf::from(path);
    }
    let out = config::arg_value(&args, "out")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("fpl_dataset.xlsx"));

    let outcome = pipeline::initialize_from_settings(
        &settings,
        Local::now().date_naive(),
        config::has_flag(&args, "force"),
        &CancelToken::new(),
        &|_| {},
    )
    .context("load dataset")?;

    let report = export::export_dataset(&out, &outcome.dataset)?;
    println!("Workbook: {}", out.display());
    println!("Teams: {}", report.teams);
    println!("Positions: {}", report.positions);
    println!("Players: {}", report.players);
    println!("Fixtures: {}", report.fixtures);
    println!("Player matches: {}", report.player_matches);
    Ok(())
}
