use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Deserialize;

use crate::config::Settings;
use crate::error::{DataError, DataResult};
use crate::model::{Dataset, MatchRecord};
use crate::normalize::non_empty;
use crate::source::RemoteSource;

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    history: Vec<RawMatch>,
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    element: u32,
    round: u32,
    minutes: u32,
    total_points: i32,
    goals_scored: u32,
    assists: u32,
    clean_sheets: u32,
    goals_conceded: u32,
    own_goals: u32,
    penalties_saved: u32,
    penalties_missed: u32,
    yellow_cards: u32,
    red_cards: u32,
    saves: u32,
    bonus: u32,
    bps: i32,
    value: u32,
    selected: u64,
}

/// Played rounds for `player_id`, ascending, one record per round.
pub fn parse_history_json(raw: &str, player_id: u32) -> DataResult<Vec<MatchRecord>> {
    let context = format!("element-summary/{player_id}");
    let trimmed = non_empty(raw, &context)?;
    let parsed: HistoryResponse =
        serde_json::from_str(trimmed).map_err(|err| DataError::schema(context.clone(), err))?;

    let mut by_round: BTreeMap<u32, MatchRecord> = BTreeMap::new();
    for m in parsed.history {
        if m.element != player_id {
            return Err(DataError::schema(
                context,
                format!("history row belongs to player {}", m.element),
            ));
        }
        let record = MatchRecord {
            round: m.round,
            minutes: m.minutes,
            total_points: m.total_points,
            goals_scored: m.goals_scored,
            assists: m.assists,
            clean_sheets: m.clean_sheets,
            goals_conceded: m.goals_conceded,
            own_goals: m.own_goals,
            penalties_saved: m.penalties_saved,
            penalties_missed: m.penalties_missed,
            yellow_cards: m.yellow_cards,
            red_cards: m.red_cards,
            saves: m.saves,
            bonus: m.bonus,
            bps: m.bps,
            value: m.value,
            selected: m.selected,
        };
        match by_round.get_mut(&record.round) {
            Some(existing) => merge_same_round(existing, &record),
            None => {
                by_round.insert(record.round, record);
            }
        }
    }

    Ok(by_round.into_values().filter(|m| m.minutes > 0).collect())
}

// Double gameweeks list two fixtures under one round; the round keeps their sum.
fn merge_same_round(into: &mut MatchRecord, other: &MatchRecord) {
    into.minutes += other.minutes;
    into.total_points += other.total_points;
    into.goals_scored += other.goals_scored;
    into.assists += other.assists;
    into.clean_sheets += other.clean_sheets;
    into.goals_conceded += other.goals_conceded;
    into.own_goals += other.own_goals;
    into.penalties_saved += other.penalties_saved;
    into.penalties_missed += other.penalties_missed;
    into.yellow_cards += other.yellow_cards;
    into.red_cards += other.red_cards;
    into.saves += other.saves;
    into.bonus += other.bonus;
    into.bps += other.bps;
    into.value = other.value;
    into.selected = other.selected;
}

/// Shared flag checked before every request of a refresh.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchProgress {
    pub current: usize,
    pub total: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct HistoryOptions {
    pub parallelism: usize,
    pub request_delay: Duration,
    pub only: Option<Vec<u32>>,
}

impl HistoryOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            parallelism: settings.fetch_parallelism,
            request_delay: settings.request_delay,
            only: settings.quick_players.clone(),
        }
    }
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            parallelism: 4,
            request_delay: Duration::from_millis(100),
            only: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ExpansionReport {
    pub requested: usize,
    pub expanded: usize,
    pub failures: Vec<DataError>,
}

/// Spaces request starts at least `delay` apart across all workers.
struct RateGate {
    delay: Duration,
    next: Mutex<Option<Instant>>,
}

impl RateGate {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            next: Mutex::new(None),
        }
    }

    fn wait(&self) {
        let sleep_for = {
            let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            let start = next.map_or(now, |n| n.max(now));
            *next = Some(start + self.delay);
            start - now
        };
        if !sleep_for.is_zero() {
            thread::sleep(sleep_for);
        }
    }
}

/// Fetches every retained player's match history into `dataset`.
///
/// A player whose request fails keeps an empty history and is listed in the
/// report. Cancellation leaves `dataset` untouched and returns `Cancelled`.
pub fn expand_history(
    source: &dyn RemoteSource,
    dataset: &mut Dataset,
    opts: &HistoryOptions,
    cancel: &CancelToken,
    on_progress: &(dyn Fn(FetchProgress) + Sync),
) -> DataResult<ExpansionReport> {
    let ids: Vec<u32> = match opts.only.as_ref() {
        Some(only) => dataset
            .players
            .keys()
            .copied()
            .filter(|id| only.contains(id))
            .collect(),
        None => dataset.players.keys().copied().collect(),
    };
    let total = ids.len();
    let gate = RateGate::new(opts.request_delay);
    let done = AtomicUsize::new(0);

    on_progress(FetchProgress {
        current: 0,
        total,
        message: format!("Fetching history for {total} players"),
    });

    let results: Vec<(u32, DataResult<Vec<MatchRecord>>)> = with_fetch_pool(opts.parallelism, || {
        ids.par_iter()
            .map(|&id| {
                if cancel.is_cancelled() {
                    return (id, Err(DataError::Cancelled));
                }
                gate.wait();
                if cancel.is_cancelled() {
                    return (id, Err(DataError::Cancelled));
                }
                let result = source
                    .player_history(id)
                    .and_then(|raw| parse_history_json(&raw, id));
                let current = done.fetch_add(1, Ordering::SeqCst) + 1;
                on_progress(FetchProgress {
                    current,
                    total,
                    message: format!("Player {id}"),
                });
                (id, result)
            })
            .collect()
    });

    if cancel.is_cancelled() {
        log::info!("history expansion cancelled after {} players", done.load(Ordering::SeqCst));
        return Err(DataError::Cancelled);
    }

    let mut report = ExpansionReport {
        requested: total,
        ..ExpansionReport::default()
    };
    for (id, result) in results {
        let Some(player) = dataset.players.get_mut(&id) else {
            continue;
        };
        match result {
            Ok(matches) => {
                player.matches = matches;
                report.expanded += 1;
            }
            Err(err) => {
                log::warn!("player {id} history unavailable: {err}");
                player.matches = Vec::new();
                report.failures.push(DataError::PlayerHistoryUnavailable {
                    player_id: id,
                    message: err.to_string(),
                });
            }
        }
    }
    log::info!(
        "expanded history for {}/{} players ({} failed)",
        report.expanded,
        report.requested,
        report.failures.len()
    );
    Ok(report)
}

fn with_fetch_pool<T>(threads: usize, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
    {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}
