use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const APP_DIR: &str = "fpl_dashboard";
const SNAPSHOT_FILE: &str = "snapshot.bin";
const LOG_FILE: &str = "fpl_dashboard.log";
pub const DEFAULT_API_BASE: &str = "https://fantasy.premierleague.com/api/";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base: String,
    pub snapshot_path: PathBuf,
    pub request_delay: Duration,
    pub fetch_parallelism: usize,
    pub retry_attempts: u32,
    pub http_timeout: Duration,
    pub require_minutes: bool,
    // Restricts history expansion to these ids when set (quick runs).
    pub quick_players: Option<Vec<u32>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            snapshot_path: default_snapshot_path(),
            request_delay: Duration::from_millis(100),
            fetch_parallelism: 4,
            retry_attempts: 3,
            http_timeout: Duration::from_secs(10),
            require_minutes: true,
            quick_players: None,
        }
    }
}

impl Settings {
    /// Loads `.env.local` and `.env` (if present), then reads `FPL_*` variables.
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Settings::default();

        let api_base = get("FPL_API_BASE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|v| if v.ends_with('/') { v } else { format!("{v}/") })
            .unwrap_or(defaults.api_base);
        let snapshot_path = get("FPL_SNAPSHOT_PATH")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.snapshot_path);
        let request_delay = get("FPL_REQUEST_DELAY_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|ms| Duration::from_millis(ms.min(5_000)))
            .unwrap_or(defaults.request_delay);
        let fetch_parallelism = get("FPL_FETCH_PARALLELISM")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(defaults.fetch_parallelism)
            .clamp(1, 16);
        let retry_attempts = get("FPL_RETRY_ATTEMPTS")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(defaults.retry_attempts)
            .clamp(1, 10);
        let http_timeout = get("FPL_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs.clamp(1, 120)))
            .unwrap_or(defaults.http_timeout);
        let require_minutes = get("FPL_REQUIRE_MINUTES")
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults.require_minutes);
        let quick_players = get("FPL_QUICK_PLAYERS").and_then(|v| parse_id_list(&v));

        Self {
            api_base,
            snapshot_path,
            request_delay,
            fetch_parallelism,
            retry_attempts,
            http_timeout,
            require_minutes,
            quick_players,
        }
    }
}

pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_id_list(raw: &str) -> Option<Vec<u32>> {
    let mut ids: Vec<u32> = raw
        .split(',')
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() { None } else { Some(ids) }
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(APP_DIR));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}

pub fn default_snapshot_path() -> PathBuf {
    app_cache_dir()
        .map(|dir| dir.join(SNAPSHOT_FILE))
        .unwrap_or_else(|| PathBuf::from(SNAPSHOT_FILE))
}

pub fn default_log_path() -> PathBuf {
    app_cache_dir()
        .map(|dir| dir.join(LOG_FILE))
        .unwrap_or_else(|| PathBuf::from(LOG_FILE))
}

/// Parses `--name=value` or `--name value` from the process arguments.
pub fn arg_value(args: &[String], name: &str) -> Option<String> {
    let long = format!("--{name}");
    let prefix = format!("--{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == long {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() && !next.starts_with("--") {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    let long = format!("--{name}");
    args.iter().any(|arg| *arg == long)
}
