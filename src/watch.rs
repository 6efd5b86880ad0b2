//! Waiting on remote jobs by polling an HTTP endpoint for marker strings.

use crate::error::Error;
use crate::{Result, env};
use eyre::WrapErr;
use std::time::Duration;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Body substring that ends polling with `true`
    pub success: String,
    /// Body substring that ends polling with `false`
    pub failure: Option<String>,
    /// Body substring reported while the job is still going
    pub running: Option<String>,
    pub max_retries: usize,
    /// Non-2xx responses tolerated before giving up with an error
    pub allowed_fails: usize,
    pub retry_interval: Duration,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    pub verbosity: u8,
}

impl PollOptions {
    pub fn new<S: Into<String>>(success: S) -> Self {
        Self {
            success: success.into(),
            ..Default::default()
        }
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        let retry_interval = match env::PIPESTEP_RETRY_INTERVAL.as_deref() {
            Some(raw) => parse_interval(raw).unwrap_or_else(|err| {
                warn!("PIPESTEP_RETRY_INTERVAL: {err}");
                DEFAULT_INTERVAL
            }),
            None => DEFAULT_INTERVAL,
        };
        Self {
            success: String::new(),
            failure: None,
            running: None,
            max_retries: 90,
            allowed_fails: 5,
            retry_interval,
            headers: vec![],
            timeout: None,
            verbosity: 1,
        }
    }
}

/// Poll `url` until its body holds the success or failure marker.
///
/// Returns `Ok(true)` on success, `Ok(false)` on the failure marker or once `max_retries`
/// requests went by without either. More than `allowed_fails` non-2xx responses abort with
/// [`Error::PollingFailed`] listing every status seen.
pub async fn poll(url: &str, opts: &PollOptions) -> Result<bool> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = opts.timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder.build()?;
    let mut statuses: Vec<u16> = vec![];

    for attempt in 0..opts.max_retries {
        let mut request = client.get(url);
        for (key, value) in &opts.headers {
            request = request.header(key, value);
        }
        let response = request
            .send()
            .await
            .wrap_err_with(|| format!("GET {url}"))?;
        let status = response.status();
        if status.is_success() {
            let body = response
                .text()
                .await
                .wrap_err_with(|| format!("GET {url}: reading body"))?;
            if body.contains(&opts.success) {
                verbose!(3, opts.verbosity, "{url}: succeeded ({} found)", opts.success);
                return Ok(true);
            }
            if let Some(failure) = &opts.failure
                && body.contains(failure)
            {
                verbose!(3, opts.verbosity, "{url}: failed ({failure} found)");
                return Ok(false);
            }
            if let Some(running) = &opts.running
                && body.contains(running)
            {
                verbose!(3, opts.verbosity, "{url}: still running ({running} found)");
            }
        } else {
            statuses.push(status.as_u16());
            warn!(
                "{url} returned status code {} after {attempt} retries, {} more failures allowed",
                status.as_u16(),
                opts.allowed_fails.saturating_sub(statuses.len())
            );
            if statuses.len() > opts.allowed_fails {
                return Err(Error::PollingFailed {
                    url: url.to_string(),
                    allowed: opts.allowed_fails,
                    statuses,
                }
                .into());
            }
        }
        if attempt + 1 < opts.max_retries {
            verbose!(
                2,
                opts.verbosity,
                "{} not found at {url}, retrying in {:?}",
                opts.success,
                opts.retry_interval
            );
            tokio::time::sleep(opts.retry_interval).await;
        }
    }
    debug!("{url}: gave up after {} requests", opts.max_retries);
    Ok(false)
}

/// Parse `500ms`, `20s`, `2m`, `1h`, or a bare number of seconds.
pub fn parse_interval(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let invalid = || Error::InvalidRetryUnit(raw.to_string());
    let split = raw
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let number: f64 = number.trim().parse().map_err(|_| invalid())?;
    if !number.is_finite() || number < 0.0 {
        return Err(invalid().into());
    }
    let seconds = match unit {
        "ms" => number / 1000.0,
        "" | "s" => number,
        "m" => number * 60.0,
        "h" => number * 3600.0,
        _ => return Err(invalid().into()),
    };
    Duration::try_from_secs_f64(seconds).map_err(|_| invalid().into())
}
