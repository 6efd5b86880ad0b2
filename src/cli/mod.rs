use std::num::NonZero;

use crate::{Result, logger};
use clap::Parser;
use clx::progress::ProgressOutput;

mod convert;
mod poll;
mod tree;

#[derive(clap::Parser)]
#[clap(
    name = "pipestep",
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION")
)]
struct Cli {
    /// Number of units to process in parallel
    #[clap(short, long, global = true)]
    jobs: Option<NonZero<usize>>,
    /// Enables verbose output
    #[clap(short, long, global = true, action = clap::ArgAction::Count, overrides_with = "quiet")]
    verbose: u8,
    /// Disables progress output
    #[clap(long, global = true)]
    no_progress: bool,
    /// Suppresses output
    #[clap(short, long, global = true, overrides_with = "verbose")]
    quiet: bool,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    Convert(Box<convert::Convert>),
    Poll(Box<poll::Poll>),
    Tree(Box<tree::Tree>),
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Copy)]
pub struct Globals {
    /// Step verbosity: 0 quiet, 1 start/finish, 2 per input, 3 commands, 4 command output
    pub verbosity: u8,
    pub jobs: Option<usize>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    let mut level = None;
    if !console::user_attended_stderr() || args.no_progress || *crate::env::PIPESTEP_NO_PROGRESS {
        clx::progress::set_output(ProgressOutput::Text);
    }
    if args.verbose > 3 || log::log_enabled!(log::Level::Trace) {
        clx::progress::set_output(ProgressOutput::Text);
        level = Some(log::LevelFilter::Trace);
    } else if args.verbose > 2 || log::log_enabled!(log::Level::Debug) {
        clx::progress::set_output(ProgressOutput::Text);
        level = Some(log::LevelFilter::Debug);
    }
    if args.quiet {
        clx::progress::set_output(ProgressOutput::Text);
        level = Some(log::LevelFilter::Warn);
    }
    logger::init(level);

    let globals = Globals {
        verbosity: if args.quiet { 0 } else { 1 + args.verbose.min(3) },
        jobs: args.jobs.map(NonZero::get),
    };
    match args.command {
        Commands::Convert(cmd) => cmd.run(globals).await,
        Commands::Poll(cmd) => cmd.run(globals).await,
        Commands::Tree(cmd) => cmd.run(globals).await,
    }
}
