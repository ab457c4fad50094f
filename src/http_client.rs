use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, USER_AGENT};

const RETRY_BACKOFF_MS: u64 = 300;

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared blocking client; the timeout of the first caller wins.
pub fn http_client(timeout: Duration) -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")
    })
}

/// Base retry step: 300 ms, never shorter than the per-request courtesy delay.
pub fn retry_backoff(request_delay: Duration) -> Duration {
    request_delay.max(Duration::from_millis(RETRY_BACKOFF_MS))
}

/// GET `url` and return the body, retrying up to `attempts` times.
///
/// The wait before retry `n` is `backoff * n`.
pub fn fetch_text(client: &Client, url: &str, attempts: u32, backoff: Duration) -> Result<String> {
    let attempts = attempts.max(1);
    let mut last_err = None;
    for attempt in 0..attempts {
        match fetch_once(client, url) {
            Ok(body) => return Ok(body),
            Err(err) => {
                log::debug!("GET {url} attempt {} failed: {err:#}", attempt + 1);
                last_err = Some(err);
                if attempt + 1 < attempts {
                    std::thread::sleep(backoff * (attempt + 1));
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("request failed")))
}

fn fetch_once(client: &Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .header(USER_AGENT, "Mozilla/5.0")
        .header(ACCEPT, "application/json")
        .send()
        .context("request failed")?;
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow!("http {}: {}", status, truncate(&body, 200)));
    }
    Ok(body)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
