use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use chrono::Local;

use crate::error::DataError;
use crate::history::{CancelToken, FetchProgress};
use crate::pipeline::{self, PipelineOptions};
use crate::snapshot::SnapshotStore;
use crate::source::RemoteSource;
use crate::state::{Delta, ProviderCommand};

/// UI side of the background loader.
pub struct ProviderHandle {
    cmd_tx: Sender<(ProviderCommand, CancelToken)>,
    current: Arc<Mutex<CancelToken>>,
    thread: JoinHandle<()>,
}

impl ProviderHandle {
    /// Queues `cmd` with a fresh cancel token, which `cancel` targets from now on.
    pub fn send(&self, cmd: ProviderCommand) -> bool {
        let token = CancelToken::new();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        self.cmd_tx.send((cmd, token)).is_ok()
    }

    /// Cancels the load in flight, if any. Later loads get a fresh token.
    pub fn cancel(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Closes the command channel and waits for the worker to exit.
    pub fn shutdown(self) {
        self.cancel();
        drop(self.cmd_tx);
        let _ = self.thread.join();
    }
}

pub fn spawn_provider(
    source: Box<dyn RemoteSource + Send>,
    store: SnapshotStore,
    opts: PipelineOptions,
    tx: Sender<Delta>,
) -> ProviderHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let current = Arc::new(Mutex::new(CancelToken::new()));
    let thread = thread::spawn(move || {
        run_commands(source.as_ref(), &store, &opts, &tx, cmd_rx);
    });
    ProviderHandle {
        cmd_tx,
        current,
        thread,
    }
}

fn run_commands(
    source: &dyn RemoteSource,
    store: &SnapshotStore,
    opts: &PipelineOptions,
    tx: &Sender<Delta>,
    cmd_rx: Receiver<(ProviderCommand, CancelToken)>,
) {
    // Blocks until the UI drops its sender.
    for (cmd, cancel) in cmd_rx {
        match cmd {
            ProviderCommand::Load { force_refresh } => {
                load(source, store, opts, force_refresh, &cancel, tx);
            }
        }
    }
}

fn load(
    source: &dyn RemoteSource,
    store: &SnapshotStore,
    opts: &PipelineOptions,
    force_refresh: bool,
    cancel: &CancelToken,
    tx: &Sender<Delta>,
) {
    let today = Local::now().date_naive();
    let progress_tx = Mutex::new(tx.clone());
    let on_progress = |progress: FetchProgress| {
        let _ = progress_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(Delta::Progress(progress));
    };
    let result = pipeline::initialize(
        source,
        store,
        opts,
        today,
        force_refresh,
        cancel,
        &on_progress,
    );
    let delta = match result {
        Ok(outcome) => {
            let failures = outcome.report.as_ref().map_or(0, |r| r.failures.len());
            for err in outcome.report.iter().flat_map(|r| r.failures.iter()) {
                let _ = tx.send(Delta::Log(format!("[WARN] {err}")));
            }
            Delta::Loaded {
                dataset: outcome.dataset,
                origin: outcome.origin,
                failures,
            }
        }
        Err(DataError::Cancelled) => Delta::Cancelled,
        Err(err) => {
            log::error!("load failed: {err}");
            Delta::Failed(err.to_string())
        }
    };
    let _ = tx.send(delta);
}
