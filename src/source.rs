use std::time::Duration;

use reqwest::blocking::Client;

use crate::config::Settings;
use crate::error::{DataError, DataResult};
use crate::http_client::{fetch_text, http_client, retry_backoff};

/// Raw JSON bodies from the Fantasy Premier League API.
pub trait RemoteSource: Sync {
    fn bootstrap(&self) -> DataResult<String>;
    fn fixtures(&self) -> DataResult<String>;
    fn player_history(&self, player_id: u32) -> DataResult<String>;
}

pub struct FplApi {
    base: String,
    client: &'static Client,
    attempts: u32,
    backoff: Duration,
}

impl FplApi {
    pub fn new(settings: &Settings) -> DataResult<Self> {
        let client = http_client(settings.http_timeout)
            .map_err(|err| DataError::fetch(settings.api_base.clone(), &err))?;
        Ok(Self {
            base: settings.api_base.clone(),
            client,
            attempts: settings.retry_attempts,
            backoff: retry_backoff(settings.request_delay),
        })
    }

    pub fn bootstrap_url(&self) -> String {
        format!("{}bootstrap-static/", self.base)
    }

    pub fn fixtures_url(&self) -> String {
        format!("{}fixtures/", self.base)
    }

    pub fn player_url(&self, player_id: u32) -> String {
        format!("{}element-summary/{player_id}/", self.base)
    }

    fn get(&self, url: String) -> DataResult<String> {
        fetch_text(self.client, &url, self.attempts, self.backoff).map_err(|err| DataError::fetch(url, &err))
    }
}

impl RemoteSource for FplApi {
    fn bootstrap(&self) -> DataResult<String> {
        self.get(self.bootstrap_url())
    }

    fn fixtures(&self) -> DataResult<String> {
        self.get(self.fixtures_url())
    }

    fn player_history(&self, player_id: u32) -> DataResult<String> {
        self.get(self.player_url(player_id))
    }
}
