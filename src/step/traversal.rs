//! The per-unit handler contract and the generic directory walks built on it.
//!
//! A step implements [`Step::run_single`] and, where it supports them, [`Step::run_directory`]
//! and [`Step::run_nested`]. Handlers it leaves out fail with [`Error::NotImplemented`] as soon
//! as `run` reaches that traversal mode. [`Step::scan_directory`] and [`Step::descend`] are the
//! stock directory and nested behaviors a step can delegate to.

use super::core::PipeStep;
use super::scheduling;
use super::types::ExtraArgs;
use crate::Result;
use crate::error::Error;
use crate::pattern::IN_FOLDER;
use crate::target::Target;
use std::path::{Path, PathBuf};

#[allow(async_fn_in_trait)]
pub trait Step {
    fn core(&self) -> &PipeStep;
    fn core_mut(&mut self) -> &mut PipeStep;

    fn name(&self) -> &str {
        &self.core().config.name
    }

    /// Process exactly one input/output pair, registering it through [`PipeStep::compute`].
    async fn run_single(
        &mut self,
        _input: &Target,
        _output: &Target,
        _args: &ExtraArgs,
    ) -> Result<()> {
        Err(not_implemented(self.name(), "run_single"))
    }

    /// Process a directory input.
    async fn run_directory(
        &mut self,
        _input: &Target,
        _output: &Target,
        _args: &ExtraArgs,
    ) -> Result<()> {
        Err(not_implemented(self.name(), "run_directory"))
    }

    /// Process a directory tree, mirroring it into the output root.
    async fn run_nested(
        &mut self,
        _input: &Target,
        _output: &Target,
        _args: &ExtraArgs,
    ) -> Result<()> {
        Err(not_implemented(self.name(), "run_nested"))
    }

    /// Where the output for `entry` lands inside `out_dir`; consulted by the redo policy.
    fn planned_output(&self, entry: &Path, out_dir: &Path) -> PathBuf {
        out_dir.join(entry.file_name().unwrap_or_default())
    }

    /// A directory matching `in_folder` is one unit. Otherwise every entry matching `in` whose
    /// planned output is stale goes to [`Step::run_single`].
    async fn scan_directory(
        &mut self,
        input: &Target,
        output: &Target,
        args: &ExtraArgs,
    ) -> Result<()> {
        let (Some(in_dir), Some(out_dir)) = (input.first(), output.first()) else {
            return Ok(());
        };
        let (in_dir, out_dir) = (in_dir.to_path_buf(), out_dir.to_path_buf());
        if self.core().config.is_match(IN_FOLDER, &in_dir) {
            return self.run_single(input, output, args).await;
        }
        let verbosity = self.core().config.verbosity;
        let mut entries = xx::file::ls(&in_dir)?;
        entries.sort();
        for entry in entries {
            if !self.core().config.matches_input(&entry) {
                trace!("{}: not an input", entry.display());
                continue;
            }
            let planned = self.planned_output(&entry, &out_dir);
            if !self.core().is_stale(&planned)? {
                verbose!(2, verbosity, "{}: up to date", planned.display());
                continue;
            }
            xx::file::mkdirp(&out_dir)?;
            self.run_single(&Target::from(entry), &Target::from(out_dir.clone()), args)
                .await?;
        }
        Ok(())
    }

    /// Walk one level. A level that directly holds inputs, either files matching `in` or
    /// directories matching `in_folder`, is handed whole to [`Step::run_directory`] and not
    /// descended further. Other subdirectories recurse through [`Step::run_nested`] with the
    /// same relative path below the output root. A plain file goes straight to
    /// [`Step::run_single`].
    async fn descend(&mut self, input: &Target, output: &Target, args: &ExtraArgs) -> Result<()> {
        let (Some(in_dir), Some(out_dir)) = (input.first(), output.first()) else {
            return Ok(());
        };
        let (in_dir, out_dir) = (in_dir.to_path_buf(), out_dir.to_path_buf());
        if !in_dir.is_dir() {
            return self.run_single(input, output, args).await;
        }
        if self.core().config.is_match(IN_FOLDER, &in_dir) {
            return self.run_directory(input, output, args).await;
        }
        let mut entries = xx::file::ls(&in_dir)?;
        entries.sort();
        let (dirs, files): (Vec<_>, Vec<_>) = entries.into_iter().partition(|p| p.is_dir());

        let config = &self.core().config;
        let holds_inputs = files.iter().any(|f| config.matches_input(f))
            || dirs.iter().any(|d| config.is_match(IN_FOLDER, d));
        if holds_inputs {
            verbose!(
                2,
                config.verbosity,
                "{}: processing level",
                xx::file::display_path(&in_dir)
            );
            return self.run_directory(input, output, args).await;
        }
        for dir in dirs {
            let Some(name) = dir.file_name() else {
                continue;
            };
            let nested_out = out_dir.join(name);
            Box::pin(self.run_nested(&Target::from(dir.clone()), &Target::from(nested_out), args))
                .await?;
        }
        Ok(())
    }

    /// Schedule `in_paths`/`out_paths` and process everything scheduled.
    ///
    /// Returns every output processed by this step so far, not just this call's.
    async fn run(
        &mut self,
        in_paths: Vec<Target>,
        out_paths: Vec<Target>,
        extra_args: ExtraArgs,
    ) -> Result<Vec<Target>> {
        scheduling::run(self, in_paths, out_paths, extra_args).await
    }
}

fn not_implemented(step: &str, handler: &'static str) -> eyre::Report {
    Error::NotImplemented {
        step: step.to_string(),
        handler,
    }
    .into()
}
