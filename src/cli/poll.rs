use std::time::Duration;

use super::Globals;
use crate::Result;
use crate::watch::{self, PollOptions};

/// Waits for a remote job by polling a URL for a marker string
///
/// Exits 0 when the success marker shows up and 1 on the failure marker or a timeout.
#[derive(Debug, clap::Args)]
pub struct Poll {
    /// URL to request
    url: String,
    /// Marker that means the job succeeded
    #[clap(long)]
    success: String,
    /// Marker that means the job failed
    #[clap(long)]
    failure: Option<String>,
    /// Marker that means the job is still running
    #[clap(long)]
    running: Option<String>,
    /// Requests to make before giving up
    #[clap(long, default_value_t = 90)]
    retries: usize,
    /// Non-2xx responses tolerated before aborting
    #[clap(long, default_value_t = 5)]
    allowed_fails: usize,
    /// Time between requests, e.g. 500ms, 20s, 2m
    #[clap(long, value_parser = parse_duration)]
    interval: Option<Duration>,
    /// Per-request timeout, e.g. 30s
    #[clap(long, value_parser = parse_duration)]
    timeout: Option<Duration>,
    /// Extra request header as KEY=VALUE
    #[clap(long = "header", value_name = "KEY=VALUE", value_parser = parse_header)]
    headers: Vec<(String, String)>,
}

impl Poll {
    pub async fn run(&self, globals: Globals) -> Result<()> {
        let defaults = PollOptions::new(&self.success);
        let opts = PollOptions {
            failure: self.failure.clone(),
            running: self.running.clone(),
            max_retries: self.retries,
            allowed_fails: self.allowed_fails,
            retry_interval: self.interval.unwrap_or(defaults.retry_interval),
            headers: self.headers.clone(),
            timeout: self.timeout,
            verbosity: globals.verbosity,
            ..defaults
        };
        if watch::poll(&self.url, &opts).await? {
            info!("{}: {} found", self.url, self.success);
            Ok(())
        } else {
            error!("{}: job failed or did not finish", self.url);
            std::process::exit(1);
        }
    }
}

fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
    watch::parse_interval(raw).map_err(|err| err.to_string())
}

fn parse_header(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Authorization=Bearer a=b").unwrap(),
            ("Authorization".to_string(), "Bearer a=b".to_string())
        );
        assert!(parse_header("novalue").is_err());
        assert!(parse_header("=x").is_err());
    }
}
