use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;

use fpl_dashboard::config::{self, Settings};
use fpl_dashboard::history::{CancelToken, FetchProgress};
use fpl_dashboard::logging;
use fpl_dashboard::pipeline::{self, DataOrigin};

fn main() -> Result<()> {
    logging::init_cli("info");
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut settings = Settings::from_env();
    if let Some(path) = config::arg_value(&args, "snapshot") {
        settings.snapshot_path = PathBuf::from(path);
    }
    let force = config::has_flag(&args, "force");
    let json_out = config::arg_value(&args, "json").map(PathBuf::from);

    let outcome = pipeline::initialize_from_settings(
        &settings,
        Local::now().date_naive(),
        force,
        &CancelToken::new(),
        &log_progress,
    )
    .context("load dataset")?;

    let dataset = &outcome.dataset;
    println!("FPL fetch complete");
    println!("Snapshot: {}", settings.snapshot_path.display());
    match outcome.origin {
        DataOrigin::Snapshot { saved_at } => println!("Source: snapshot saved {saved_at}"),
        DataOrigin::Remote {
            saved_at: Some(saved_at),
        } => println!("Source: API (snapshot written {saved_at})"),
        DataOrigin::Remote { saved_at: None } => println!("Source: API (snapshot NOT written)"),
    }
    println!("Teams: {}", dataset.teams.len());
    println!("Positions: {}", dataset.positions.len());
    println!("Players: {}", dataset.players.len());
    println!("Finished fixtures: {}", dataset.fixtures.len());
    println!("Player matches: {}", dataset.match_count());
    println!("Latest round: {}", dataset.max_round());
    if let Some(report) = outcome.report.as_ref() {
        println!(
            "Histories: {}/{}",
            report.expanded, report.requested
        );
        if !report.failures.is_empty() {
            println!("Errors: {}", report.failures.len());
            for err in report.failures.iter().take(8) {
                println!(" - {err}");
            }
        }
    }

    if let Some(path) = json_out {
        let body = serde_json::to_string_pretty(&dataset.to_nested_json())
            .context("serialize dataset")?;
        fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
        println!("JSON: {}", path.display());
    }

    Ok(())
}

fn log_progress(progress: FetchProgress) {
    if progress.total == 0 {
        log::info!("{}", progress.message);
    } else if progress.current % 50 == 0 || progress.current == progress.total {
        log::info!("history {}/{}", progress.current, progress.total);
    }
}
