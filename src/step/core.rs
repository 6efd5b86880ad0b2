//! State shared by every step: configuration, the processed-work ledger, the execution
//! backend and the inputs scheduled for the next `run`.

use super::types::StepConfig;
use super::validity::RedoPolicy;
use crate::Result;
use crate::backend::{Backend, Work};
use crate::command;
use crate::config::StepRecord;
use crate::ledger::{Ledger, Outcome};
use crate::target::Target;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct PipeStep {
    pub config: StepConfig,
    pub exec_path: Option<String>,
    /// Fallback executables tried when `exec_path` can't be launched
    pub common_execs: Vec<String>,
    pub ledger: Ledger,
    backend: Backend,
    scheduled_in: Vec<Target>,
    scheduled_out: Vec<Target>,
}

impl PipeStep {
    pub fn new(mut config: StepConfig, exec_path: Option<String>) -> Result<Self> {
        config.rederive()?;
        let backend = Backend::new(config.workers, config.scheduler);
        Ok(Self {
            config,
            exec_path,
            common_execs: vec![],
            ledger: Ledger::new(),
            backend,
            scheduled_in: vec![],
            scheduled_out: vec![],
        })
    }

    /// Rebuild a step from its persisted record. Processed entries come back as plain
    /// paths without captured output.
    pub fn from_record(record: StepRecord) -> Result<Self> {
        let mut step = Self::new(record.config, record.exec_path)?;
        step.restore_processed(&record.processed_in, &record.processed_out);
        Ok(step)
    }

    /// Mark persisted input/output labels as processed.
    pub fn restore_processed(&mut self, processed_in: &[String], processed_out: &[String]) {
        for (input, output) in processed_in.iter().zip(processed_out) {
            self.ledger.record(
                Target::from(input.as_str()),
                Target::from(output.as_str()),
                Outcome::Done(Default::default()),
                None,
            );
        }
    }

    pub fn to_record(&self) -> StepRecord {
        StepRecord {
            config: self.config.clone(),
            exec_path: self.exec_path.clone(),
            processed_in: self
                .ledger
                .processed_in()
                .iter()
                .map(Target::label)
                .collect(),
            processed_out: self
                .ledger
                .processed_out()
                .iter()
                .map(Target::label)
                .collect(),
        }
    }

    /// Pick the first executable among `exec_path` and `common_execs` that launches.
    pub async fn resolve_exec(&mut self) -> Option<String> {
        let configured = self.exec_path.clone();
        let candidates = configured.iter().chain(&self.common_execs).cloned();
        let mut chosen = None;
        for candidate in candidates {
            if command::probe(&candidate).await {
                chosen = Some(candidate);
                break;
            }
        }
        match (&chosen, &configured) {
            (Some(chosen), Some(configured)) if chosen != configured => {
                warn!("{}: exec_path is set to {chosen}", self.config.name);
            }
            (Some(chosen), None) => {
                warn!("{}: exec_path is set to {chosen}", self.config.name);
            }
            (None, _) => {
                debug!("{}: no launchable executable found", self.config.name);
            }
            _ => {}
        }
        if chosen.is_some() {
            self.exec_path = chosen.clone();
        }
        chosen
    }

    /// The executable to invoke, falling back to the step name.
    pub fn exec(&self) -> &str {
        self.exec_path.as_deref().unwrap_or(&self.config.name)
    }

    /// `<dir of output>/<name>_log.txt` when logs are kept.
    pub fn log_path(&self, output: &Path) -> Option<PathBuf> {
        if !self.config.save_log {
            return None;
        }
        let dir = if output.is_dir() {
            output
        } else {
            output.parent().unwrap_or(output)
        };
        Some(dir.join(format!("{}_log.txt", self.config.name)))
    }

    pub fn redo_policy(&self) -> RedoPolicy<'_> {
        RedoPolicy {
            overwrite: self.config.overwrite,
            threshold: self.config.redo_threshold,
            marker: self.config.completion_marker(),
        }
    }

    pub fn is_stale(&self, output: &Path) -> Result<bool> {
        self.redo_policy().is_stale(output)
    }

    /// Register one unit of work in the ledger, running it now or deferring it.
    pub async fn compute(
        &mut self,
        work: Work,
        input: Target,
        output: Target,
        log_path: Option<PathBuf>,
    ) {
        self.backend
            .compute(&mut self.ledger, work, input, output, log_path)
            .await;
    }

    /// Run every deferred unit. Returns how many were realized.
    pub async fn realize(&mut self) -> usize {
        if !self.backend.has_pending() {
            return 0;
        }
        self.backend
            .realize(&mut self.ledger, &self.config.name, self.config.verbosity)
            .await
    }

    /// Append inputs and outputs to the schedule, then make the two line up: no outputs means
    /// each input's parent directory, too few outputs repeat the last one.
    pub fn schedule(&mut self, in_paths: Vec<Target>, out_paths: Vec<Target>) {
        if !self.backend.has_pending() {
            self.backend
                .configure(self.config.workers, self.config.scheduler);
        }
        self.scheduled_in.extend(in_paths);
        self.scheduled_out.extend(out_paths);
        if self.scheduled_out.is_empty() {
            self.scheduled_out = self.scheduled_in.iter().map(Target::parent).collect();
        }
        if let Some(last) = self.scheduled_out.last().cloned()
            && self.scheduled_out.len() < self.scheduled_in.len()
        {
            self.scheduled_out.resize(self.scheduled_in.len(), last);
        }
    }

    pub fn scheduled(&self) -> (&[Target], &[Target]) {
        (&self.scheduled_in, &self.scheduled_out)
    }

    pub fn clear_schedule(&mut self) {
        self.scheduled_in.clear();
        self.scheduled_out.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::types::ConfigField;

    fn step() -> PipeStep {
        PipeStep::new(StepConfig::new("test"), None).unwrap()
    }

    #[test]
    fn test_schedule_defaults_to_parents() {
        let mut step = step();
        step.schedule(vec!["/a/x.raw".into(), "/b/y.raw".into()], vec![]);
        let (ins, outs) = step.scheduled();
        assert_eq!(ins.len(), 2);
        assert_eq!(outs, &[Target::from("/a"), Target::from("/b")]);
    }

    #[test]
    fn test_schedule_pads_with_last() {
        let mut step = step();
        step.schedule(
            vec!["/a/x".into(), "/a/y".into(), "/a/z".into()],
            vec!["/out1".into()],
        );
        assert_eq!(step.scheduled().1, vec![Target::from("/out1"); 3].as_slice());
        step.clear_schedule();
        assert!(step.scheduled().0.is_empty());
        assert!(step.scheduled().1.is_empty());
    }

    #[test]
    fn test_log_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut step = step();
        assert_eq!(step.log_path(dir.path()), None);
        step.config.set(ConfigField::SaveLog, "true").unwrap();
        assert_eq!(
            step.log_path(dir.path()),
            Some(dir.path().join("test_log.txt"))
        );
        assert_eq!(
            step.log_path(&dir.path().join("x.mzML")),
            Some(dir.path().join("test_log.txt"))
        );
    }

    #[test]
    fn test_record_round_trip() {
        let mut step = step();
        step.ledger.record(
            "/in/a.raw".into(),
            "/out".into(),
            Outcome::Done(Default::default()),
            None,
        );
        let record = step.to_record();
        assert_eq!(record.processed_in, vec!["/in/a.raw".to_string()]);
        let restored = PipeStep::from_record(record).unwrap();
        assert!(restored.ledger.contains(&"/in/a.raw".into()));
        assert_eq!(restored.ledger.processed_out(), vec![Target::from("/out")]);
    }

    #[tokio::test]
    async fn test_resolve_exec_falls_back() {
        let mut step = step();
        step.exec_path = Some("definitely-not-a-real-program-xyz".to_string());
        step.common_execs = vec!["also-not-real-abc".to_string()];
        assert_eq!(step.resolve_exec().await, None);
        assert_eq!(
            step.exec_path.as_deref(),
            Some("definitely-not-a-real-program-xyz")
        );
    }
}
