use itertools::Itertools;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid case conversion `{0}`: choose upper or lower")]
    InvalidCaseConversion(String),

    #[error("invalid retry interval `{0}`: expected a number with a unit of ms, s, m or h")]
    InvalidRetryUnit(String),

    #[error(
        "request to {url} failed more than {allowed} times with status codes: {}",
        render_statuses(.statuses)
    )]
    PollingFailed {
        url: String,
        allowed: usize,
        statuses: Vec<u16>,
    },

    #[error("{step}: {handler} is not implemented")]
    NotImplemented { step: String, handler: &'static str },

    #[error("unknown configuration field `{0}`")]
    UnknownField(String),

    #[error("{message}")]
    UnitFailed {
        message: String,
        stdout: String,
        stderr: String,
    },
}

fn render_statuses(statuses: &[u16]) -> String {
    statuses.iter().map(|s| s.to_string()).join(", ")
}
