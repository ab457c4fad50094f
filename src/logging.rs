use std::fs::{self, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};

/// stderr logger for the command line tools, `RUST_LOG` overrides `default_level`.
pub fn init_cli(default_level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .try_init();
}

/// Logger for the terminal UI: everything goes to a file so the alternate screen stays clean.
pub fn init_file(path: &Path, default_level: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok();
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .context("logger already initialized")?;
    Ok(())
}
