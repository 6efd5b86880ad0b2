//! External executable invocation for single units.
//!
//! Output is always captured; how much of it reaches the log depends on the step's verbosity
//! (stderr from 3, stdout from 4). When a log path is set the combined capture is written
//! there whether or not the command succeeded.

use crate::Result;
use crate::backend::Work;
use crate::error::Error;
use crate::ledger::UnitOutput;
use ensembler::CmdLineRunner;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub log_path: Option<PathBuf>,
    pub verbosity: u8,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            log_path: None,
            verbosity: 1,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg<P: AsRef<Path>>(self, path: P) -> Self {
        let path = path.as_ref().to_string_lossy().to_string();
        self.arg(path)
    }

    pub fn log_path(mut self, log_path: Option<PathBuf>) -> Self {
        self.log_path = log_path;
        self
    }

    pub fn verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn into_work(self) -> Work {
        Box::pin(self.execute())
    }

    pub async fn execute(self) -> Result<UnitOutput> {
        verbose!(3, self.verbosity, "starting command: {self}");
        let cmd = CmdLineRunner::new(&self.program)
            .args(&self.args)
            .show_stderr_on_error(false);
        let (stdout, stderr, failure) = match cmd.execute().await {
            Ok(result) => (result.stdout, result.stderr, None),
            Err(err) => {
                if let ensembler::Error::ScriptFailed(e) = &err {
                    (e.3.stdout.clone(), e.3.stderr.clone(), Some(format!("{self}: {err}")))
                } else {
                    (String::new(), String::new(), Some(format!("{self}: {err}")))
                }
            }
        };
        if self.verbosity >= 3 {
            for line in stderr.lines() {
                info!("{}: {line}", self.program);
            }
        }
        if self.verbosity >= 4 {
            for line in stdout.lines() {
                info!("{}: {line}", self.program);
            }
        }
        if let Some(log_path) = &self.log_path {
            xx::file::write(log_path, format!("out:\n{stdout}\n\n\nerr:\n{stderr}"))?;
        }
        match failure {
            Some(message) => Err(Error::UnitFailed {
                message,
                stdout,
                stderr,
            }
            .into()),
            None => Ok(UnitOutput {
                payload: None,
                stdout,
                stderr,
            }),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words =
            std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        write!(f, "{}", shell_words::join(words))
    }
}

/// Whether `program` can be launched at all. A non-zero exit from `--help` still counts.
pub async fn probe(program: &str) -> bool {
    let result = CmdLineRunner::new(program)
        .arg("--help")
        .show_stderr_on_error(false)
        .execute()
        .await;
    match result {
        Ok(_) => true,
        Err(ensembler::Error::ScriptFailed(_)) => true,
        Err(err) => {
            trace!("{program}: {err}");
            false
        }
    }
}
