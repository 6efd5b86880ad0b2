//! Step execution.
//!
//! A step wraps one kind of processing (format conversion, feature finding, ...) behind a
//! uniform contract. It owns a [`PipeStep`]: configuration, a ledger of processed work, an
//! execution backend, and the inputs scheduled for the next run.
//!
//! # Module Organization
//!
//! - [`types`] - Configuration and runtime-settable fields
//! - [`core`] - Shared step state
//! - [`traversal`] - The [`Step`] handler contract and directory walks
//! - [`scheduling`] - The `run` loop
//! - [`validity`] - Redo policy for existing outputs
//!
//! # Usage
//!
//! ```ignore
//! let mut step = ConvertStep::new(config, "mzML")?;
//! let outputs = step
//!     .run(vec!["/data/raw".into()], vec!["/data/mzml".into()], ExtraArgs::new())
//!     .await?;
//! ```

pub mod core;
mod scheduling;
pub mod traversal;
pub mod types;
pub mod validity;

pub use self::core::PipeStep;
pub use self::traversal::Step;
pub use self::types::{ConfigField, ExtraArgs, StepConfig};
pub use self::validity::{RedoPolicy, last_line_with_content, replace_file_ending};
