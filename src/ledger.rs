//! The index-aligned record of processed work.
//!
//! Every unit of work is keyed by its input target. Recording an input that is already present
//! overwrites its slot in place, so the position of an input never changes for the life of a
//! step and the projected sequences (`processed_in`, `processed_out`, `stdouts`, ...) always have
//! the same length.

use crate::target::Target;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The three-part result of one unit: payload, captured stdout, captured stderr.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitOutput {
    pub payload: Option<serde_json::Value>,
    pub stdout: String,
    pub stderr: String,
}

/// Handle for a deferred task waiting in the execution backend's batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub usize);

/// What is known about a unit of work.
///
/// `Pending` must be realized before any output field can be read; the accessors return
/// empty values for it.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Pending(TaskId),
    Done(UnitOutput),
    Failed {
        error: String,
        stdout: String,
        stderr: String,
    },
}

impl Outcome {
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            Outcome::Done(output) => output.payload.as_ref(),
            _ => None,
        }
    }

    pub fn stdout(&self) -> &str {
        match self {
            Outcome::Done(output) => &output.stdout,
            Outcome::Failed { stdout, .. } => stdout,
            Outcome::Pending(_) => "",
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            Outcome::Done(output) => &output.stderr,
            Outcome::Failed { stderr, .. } => stderr,
            Outcome::Pending(_) => "",
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn task(&self) -> Option<TaskId> {
        match self {
            Outcome::Pending(task) => Some(*task),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub output: Target,
    pub outcome: Outcome,
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: IndexMap<Target, Record>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single mutation path: overwrite the slot for `input` or append a new one.
    pub fn record(
        &mut self,
        input: Target,
        output: Target,
        outcome: Outcome,
        log_path: Option<PathBuf>,
    ) {
        let record = Record {
            output,
            outcome,
            log_path,
        };
        if let Some(slot) = self.records.get_mut(&input) {
            *slot = record;
        } else {
            self.records.insert(input, record);
        }
    }

    /// Replace only the outcome of an existing slot. Returns false if `input` is unknown.
    pub fn resolve(&mut self, input: &Target, outcome: Outcome) -> bool {
        match self.records.get_mut(input) {
            Some(record) => {
                record.outcome = outcome;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, input: &Target) -> bool {
        self.records.contains_key(input)
    }

    pub fn get(&self, input: &Target) -> Option<&Record> {
        self.records.get(input)
    }

    pub fn position(&self, input: &Target) -> Option<usize> {
        self.records.get_index_of(input)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn processed_in(&self) -> Vec<Target> {
        self.records.keys().cloned().collect()
    }

    pub fn processed_out(&self) -> Vec<Target> {
        self.records.values().map(|r| r.output.clone()).collect()
    }

    pub fn stdouts(&self) -> Vec<&str> {
        self.records.values().map(|r| r.outcome.stdout()).collect()
    }

    pub fn stderrs(&self) -> Vec<&str> {
        self.records.values().map(|r| r.outcome.stderr()).collect()
    }

    pub fn log_paths(&self) -> Vec<Option<&Path>> {
        self.records
            .values()
            .map(|r| r.log_path.as_deref())
            .collect()
    }

    pub fn results(&self) -> Vec<Option<&serde_json::Value>> {
        self.records.values().map(|r| r.outcome.payload()).collect()
    }

    pub fn futures(&self) -> Vec<Option<TaskId>> {
        self.records.values().map(|r| r.outcome.task()).collect()
    }

    pub fn pending(&self) -> impl Iterator<Item = (&Target, TaskId)> {
        self.records
            .iter()
            .filter_map(|(input, r)| r.outcome.task().map(|task| (input, task)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Target, &str)> {
        self.records
            .iter()
            .filter_map(|(input, r)| r.outcome.error().map(|e| (input, e)))
    }
}
