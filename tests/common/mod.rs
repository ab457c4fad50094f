#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fpl_dashboard::error::{DataError, DataResult};
use fpl_dashboard::history::{CancelToken, HistoryOptions};
use fpl_dashboard::normalize::NormalizeOptions;
use fpl_dashboard::pipeline::PipelineOptions;
use fpl_dashboard::source::RemoteSource;

pub const BOOTSTRAP: &str = include_str!("../fixtures/bootstrap.json");
pub const FIXTURES: &str = include_str!("../fixtures/fixtures.json");

pub fn history_fixture(player_id: u32) -> Option<&'static str> {
    match player_id {
        1 => Some(include_str!("../fixtures/element_summary_1.json")),
        2 => Some(include_str!("../fixtures/element_summary_2.json")),
        3 => Some(include_str!("../fixtures/element_summary_3.json")),
        4 => Some(include_str!("../fixtures/element_summary_4.json")),
        _ => None,
    }
}

/// Serves the recorded API payloads from `tests/fixtures`.
#[derive(Default)]
pub struct FixtureSource {
    pub failing: Vec<u32>,
    pub bootstrap_override: Option<String>,
    pub cancel_after: Option<(usize, CancelToken)>,
    pub calls: AtomicUsize,
    pub history_calls: Mutex<Vec<u32>>,
    pub bootstrap_delay: Duration,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(ids: &[u32]) -> Self {
        Self {
            failing: ids.to_vec(),
            ..Self::default()
        }
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RemoteSource for FixtureSource {
    fn bootstrap(&self) -> DataResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.bootstrap_delay.is_zero() {
            std::thread::sleep(self.bootstrap_delay);
        }
        Ok(self
            .bootstrap_override
            .clone()
            .unwrap_or_else(|| BOOTSTRAP.to_string()))
    }

    fn fixtures(&self) -> DataResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FIXTURES.to_string())
    }

    fn player_history(&self, player_id: u32) -> DataResult<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.history_calls
            .lock()
            .expect("history calls lock")
            .push(player_id);
        if let Some((after, token)) = self.cancel_after.as_ref() {
            // Two league-wide calls come first.
            if n + 1 >= after + 2 {
                token.cancel();
            }
        }
        if self.failing.contains(&player_id) {
            return Err(DataError::RemoteFetch {
                url: format!("element-summary/{player_id}/"),
                message: "HTTP 503".to_string(),
            });
        }
        history_fixture(player_id)
            .map(str::to_string)
            .ok_or_else(|| DataError::RemoteFetch {
                url: format!("element-summary/{player_id}/"),
                message: "HTTP 404".to_string(),
            })
    }
}

pub fn fast_options() -> PipelineOptions {
    PipelineOptions {
        normalize: NormalizeOptions::default(),
        history: HistoryOptions {
            parallelism: 2,
            request_delay: Duration::ZERO,
            only: None,
        },
    }
}
