use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Local;

use fpl_dashboard::chart::{self, Aggregation, Dimensions};
use fpl_dashboard::config::{self, Settings};
use fpl_dashboard::history::CancelToken;
use fpl_dashboard::model::Statistic;
use fpl_dashboard::{html, logging, pipeline};

fn main() -> Result<()> {
    logging::init_cli("info");
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut settings = Settings::from_env();
    if let Some(path) = config::arg_value(&args, "snapshot") {
        settings.snapshot_path = PathBuf::from(path);
    }
    let statistic = match config::arg_value(&args, "stat") {
        Some(raw) => raw.parse::<Statistic>()?,
        None => Statistic::default(),
    };
    let aggregation = match config::arg_value(&args, "aggregate") {
        Some(raw) => raw.parse::<Aggregation>().map_err(|err| anyhow!(err))?,
        None => Aggregation::default(),
    };
    let dims = match config::arg_value(&args, "viewport") {
        Some(raw) => Dimensions::parse_viewport(&raw)
            .ok_or_else(|| anyhow!("bad --viewport `{raw}` (expected WIDTHxHEIGHT)"))?,
        None => Dimensions::default(),
    };
    let position = config::arg_value(&args, "position");
    let out = config::arg_value(&args, "out")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("index.html"));

    let outcome = pipeline::initialize_from_settings(
        &settings,
        Local::now().date_naive(),
        config::has_flag(&args, "force"),
        &CancelToken::new(),
        &|_| {},
    )
    .context("load dataset")?;

    if let Some(pos) = position.as_deref() {
        if !outcome.dataset.position_names().iter().any(|p| p == pos) {
            log::warn!("no players in position {pos}; line view will be empty");
        }
    }

    let spec = chart::build(
        &outcome.dataset,
        dims,
        statistic,
        aggregation,
        position.as_deref(),
    );
    html::write_page(&out, &spec, html::DEFAULT_TITLE)?;
    println!(
        "Wrote {} ({} players, {})",
        out.display(),
        spec.points.len(),
        spec.line_title()
    );
    Ok(())
}
