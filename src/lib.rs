#[macro_use]
extern crate log;

pub use error::Error;
pub use target::Target;

pub type Result<T> = eyre::Result<T>;

#[macro_use]
mod macros;

pub mod backend;
pub mod cli;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod ledger;
pub mod logger;
pub mod nester;
pub mod pattern;
pub mod step;
pub mod steps;
pub mod target;
pub mod watch;
