//! Inline or deferred execution of units of work.
//!
//! With one worker a unit runs as soon as it is handed to [`Backend::compute`]. With more, it is
//! parked in a batch and its ledger slot holds a pending [`TaskId`] until [`Backend::realize`]
//! runs the whole batch under a bounded worker pool. A failing or panicking unit never aborts
//! the batch; it lands in its own slot as [`Outcome::Failed`].

use crate::error::Error;
use crate::ledger::{Ledger, Outcome, TaskId, UnitOutput};
use crate::target::Target;
use crate::{Result, env};
use clx::progress::{ProgressJob, ProgressJobBuilder, ProgressJobDoneBehavior, ProgressStatus};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A unit of work. Futures are lazy, so holding one is enough to defer it.
pub type Work = Pin<Box<dyn Future<Output = Result<UnitOutput>> + Send + 'static>>;

/// How a deferred batch is realized.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Scheduler {
    /// Tasks run on the async runtime's worker threads
    #[default]
    Threads,
    /// Each task gets a dedicated blocking OS thread
    Processes,
    /// Tasks run one after another on the caller's task
    Synchronous,
}

struct Deferred {
    task: TaskId,
    input: Target,
    work: Work,
}

pub struct Backend {
    workers: usize,
    scheduler: Scheduler,
    batch: Vec<Deferred>,
    next_task: usize,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("workers", &self.workers)
            .field("scheduler", &self.scheduler)
            .field("batch", &self.batch.len())
            .finish()
    }
}

impl Backend {
    pub fn new(workers: usize, scheduler: Scheduler) -> Self {
        Self {
            workers: workers.max(1),
            scheduler,
            batch: vec![],
            next_task: 0,
        }
    }

    pub fn configure(&mut self, workers: usize, scheduler: Scheduler) {
        self.workers = workers.max(1);
        self.scheduler = scheduler;
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_deferred(&self) -> bool {
        self.workers > 1
    }

    pub fn has_pending(&self) -> bool {
        !self.batch.is_empty()
    }

    /// Run `work` now, or queue it and leave a pending slot behind.
    pub async fn compute(
        &mut self,
        ledger: &mut Ledger,
        work: Work,
        input: Target,
        output: Target,
        log_path: Option<PathBuf>,
    ) {
        if !self.is_deferred() {
            let outcome = isolate(work, Scheduler::Synchronous).await;
            if let Some(error) = outcome.error() {
                debug!("{input}: {error}");
            }
            ledger.record(input, output, outcome, log_path);
            return;
        }
        let task = TaskId(self.next_task);
        self.next_task += 1;
        trace!("{input}: deferred as task {}", task.0);
        ledger.record(input.clone(), output, Outcome::Pending(task), log_path);
        self.batch.push(Deferred { task, input, work });
    }

    /// Execute every queued task and write the results into their ledger slots.
    ///
    /// Returns the number of tasks realized. Slots that were re-recorded after a task was
    /// queued keep their newer state.
    pub async fn realize(&mut self, ledger: &mut Ledger, name: &str, verbosity: u8) -> usize {
        let batch = std::mem::take(&mut self.batch);
        let total = batch.len();
        if total == 0 {
            return 0;
        }
        debug!(
            "{name}: realizing {total} task(s) with {} {} worker(s)",
            self.workers, self.scheduler
        );
        let progress = (verbosity >= 1 && !*env::PIPESTEP_NO_PROGRESS)
            .then(|| build_progress(name, total));

        let resolved = match self.scheduler {
            Scheduler::Synchronous => {
                let mut resolved = Vec::with_capacity(total);
                for deferred in batch {
                    let outcome = isolate(deferred.work, Scheduler::Synchronous).await;
                    resolved.push((deferred.input, deferred.task, outcome));
                    tick(progress.as_ref(), resolved.len());
                }
                resolved
            }
            scheduler => self.realize_pooled(batch, scheduler, progress.as_ref()).await,
        };

        let mut failed = 0;
        for (input, task, outcome) in resolved {
            if outcome.is_failed() {
                failed += 1;
            }
            let current = ledger.get(&input).and_then(|r| r.outcome.task());
            if current == Some(task) {
                ledger.resolve(&input, outcome);
            } else {
                trace!("{input}: task {} superseded", task.0);
            }
        }
        if let Some(progress) = progress {
            progress.set_status(if failed > 0 {
                ProgressStatus::Failed
            } else {
                ProgressStatus::Done
            });
        }
        total
    }

    async fn realize_pooled(
        &self,
        batch: Vec<Deferred>,
        scheduler: Scheduler,
        progress: Option<&Arc<ProgressJob>>,
    ) -> Vec<(Target, TaskId, Outcome)> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut set = JoinSet::new();
        for deferred in batch {
            let semaphore = semaphore.clone();
            set.spawn(async move {
                // the semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = isolate(deferred.work, scheduler).await;
                (deferred.input, deferred.task, outcome)
            });
        }
        let mut resolved = Vec::new();
        while let Some(res) = set.join_next().await {
            match res {
                Ok(done) => {
                    resolved.push(done);
                    tick(progress, resolved.len());
                }
                Err(e) => error!("deferred task lost: {e}"),
            }
        }
        resolved
    }
}

/// Run one unit behind its own task boundary so a panic becomes a failed outcome.
async fn isolate(work: Work, scheduler: Scheduler) -> Outcome {
    let joined = match scheduler {
        Scheduler::Processes => {
            let handle = tokio::runtime::Handle::current();
            tokio::task::spawn_blocking(move || handle.block_on(work)).await
        }
        Scheduler::Threads | Scheduler::Synchronous => tokio::spawn(work).await,
    };
    match joined {
        Ok(result) => into_outcome(result),
        Err(e) => Outcome::Failed {
            error: format!("task aborted: {e}"),
            stdout: String::new(),
            stderr: String::new(),
        },
    }
}

fn into_outcome(result: Result<UnitOutput>) -> Outcome {
    match result {
        Ok(output) => Outcome::Done(output),
        Err(err) => match err.downcast_ref::<Error>() {
            Some(Error::UnitFailed {
                message,
                stdout,
                stderr,
            }) => Outcome::Failed {
                error: message.clone(),
                stdout: stdout.clone(),
                stderr: stderr.clone(),
            },
            _ => Outcome::Failed {
                error: format!("{err:#}"),
                stdout: String::new(),
                stderr: String::new(),
            },
        },
    }
}

fn build_progress(name: &str, total: usize) -> Arc<ProgressJob> {
    ProgressJobBuilder::new()
        .body("{{spinner()}} {{name}} {{progress_bar(width=20)}} {{cur}}/{{total}}")
        .body_text(Some("{{name}} {{cur}}/{{total}}"))
        .prop("name", name)
        .prop("cur", &0)
        .prop("total", &total)
        .progress_current(0)
        .progress_total(total)
        .status(ProgressStatus::Running)
        .on_done(ProgressJobDoneBehavior::Keep)
        .start()
}

fn tick(progress: Option<&Arc<ProgressJob>>, done: usize) {
    if let Some(progress) = progress {
        progress.prop("cur", &done);
        progress.progress_current(done);
        progress.update();
    }
}
