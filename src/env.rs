pub use std::env::*;
use std::sync::LazyLock;

pub static PIPESTEP_LOG: LazyLock<log::LevelFilter> = LazyLock::new(|| {
    var_log_level("PIPESTEP_LOG")
        .or(var_log_level("PIPESTEP_LOG_LEVEL"))
        .unwrap_or(log::LevelFilter::Info)
});

// Default worker count for steps that don't set one explicitly
pub static PIPESTEP_JOBS: LazyLock<usize> = LazyLock::new(|| {
    var("PIPESTEP_JOBS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|jobs| *jobs > 0)
        .unwrap_or(1)
});

pub static PIPESTEP_RETRY_INTERVAL: LazyLock<Option<String>> =
    LazyLock::new(|| var("PIPESTEP_RETRY_INTERVAL").ok());

pub static PIPESTEP_NO_PROGRESS: LazyLock<bool> =
    LazyLock::new(|| var_true("PIPESTEP_NO_PROGRESS"));

fn var_log_level(name: &str) -> Option<log::LevelFilter> {
    var(name).ok().and_then(|level| level.parse().ok())
}

fn var_true(name: &str) -> bool {
    var(name)
        .map(|val| val.to_lowercase())
        .map(|val| val == "true" || val == "1")
        .unwrap_or(false)
}
