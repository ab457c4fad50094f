use chrono::{DateTime, NaiveDate, Utc};

use crate::config::Settings;
use crate::error::{DataError, DataResult};
use crate::history::{CancelToken, ExpansionReport, FetchProgress, HistoryOptions, expand_history};
use crate::model::Dataset;
use crate::normalize::{NormalizeOptions, fetch_and_normalize};
use crate::snapshot::SnapshotStore;
use crate::source::{FplApi, RemoteSource};

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub normalize: NormalizeOptions,
    pub history: HistoryOptions,
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            normalize: NormalizeOptions {
                require_minutes: settings.require_minutes,
            },
            history: HistoryOptions::from_settings(settings),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Snapshot { saved_at: DateTime<Utc> },
    // `saved_at` is `None` when the snapshot write failed.
    Remote { saved_at: Option<DateTime<Utc>> },
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub dataset: Dataset,
    pub origin: DataOrigin,
    pub report: Option<ExpansionReport>,
}

/// Fetch, normalize and expand; nothing is persisted.
pub fn run_pipeline(
    source: &dyn RemoteSource,
    opts: &PipelineOptions,
    cancel: &CancelToken,
    on_progress: &(dyn Fn(FetchProgress) + Sync),
) -> DataResult<(Dataset, ExpansionReport)> {
    if cancel.is_cancelled() {
        return Err(DataError::Cancelled);
    }
    on_progress(FetchProgress {
        current: 0,
        total: 0,
        message: "Fetching league data".to_string(),
    });
    let mut dataset = fetch_and_normalize(source, opts.normalize)?;
    if cancel.is_cancelled() {
        return Err(DataError::Cancelled);
    }
    let report = expand_history(source, &mut dataset, &opts.history, cancel, on_progress)?;
    Ok((dataset, report))
}

/// Full remote refresh followed by an atomic snapshot write.
///
/// A failed write is logged and reported through `DataOrigin::Remote { saved_at: None }`;
/// the freshly built dataset is still returned.
pub fn refresh(
    source: &dyn RemoteSource,
    store: &SnapshotStore,
    opts: &PipelineOptions,
    cancel: &CancelToken,
    on_progress: &(dyn Fn(FetchProgress) + Sync),
) -> DataResult<LoadOutcome> {
    let (dataset, report) = run_pipeline(source, opts, cancel, on_progress)?;
    if cancel.is_cancelled() {
        return Err(DataError::Cancelled);
    }
    let saved_at = match store.save(&dataset) {
        Ok(saved_at) => Some(saved_at),
        Err(err) => {
            log::warn!("{err}");
            None
        }
    };
    Ok(LoadOutcome {
        dataset,
        origin: DataOrigin::Remote { saved_at },
        report: Some(report),
    })
}

/// Process start-up: reuse today's snapshot, otherwise refresh from the API.
pub fn initialize(
    source: &dyn RemoteSource,
    store: &SnapshotStore,
    opts: &PipelineOptions,
    today: NaiveDate,
    force_refresh: bool,
    cancel: &CancelToken,
    on_progress: &(dyn Fn(FetchProgress) + Sync),
) -> DataResult<LoadOutcome> {
    if !force_refresh {
        match store.load_fresh(today) {
            Ok(snapshot) => {
                log::info!(
                    "using snapshot from {} ({} players)",
                    snapshot.saved_at,
                    snapshot.dataset.players.len()
                );
                return Ok(LoadOutcome {
                    dataset: snapshot.dataset,
                    origin: DataOrigin::Snapshot {
                        saved_at: snapshot.saved_at,
                    },
                    report: None,
                });
            }
            Err(err) => log::info!("{err}; refreshing from remote"),
        }
    }
    refresh(source, store, opts, cancel, on_progress)
}

/// `initialize` wired to the live API and the configured snapshot path.
pub fn initialize_from_settings(
    settings: &Settings,
    today: NaiveDate,
    force_refresh: bool,
    cancel: &CancelToken,
    on_progress: &(dyn Fn(FetchProgress) + Sync),
) -> DataResult<LoadOutcome> {
    let source = FplApi::new(settings)?;
    let store = SnapshotStore::new(settings.snapshot_path.clone());
    let opts = PipelineOptions::from_settings(settings);
    initialize(
        &source,
        &store,
        &opts,
        today,
        force_refresh,
        cancel,
        on_progress,
    )
}
