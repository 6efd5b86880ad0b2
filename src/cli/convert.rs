use std::path::PathBuf;

use super::Globals;
use crate::Result;
use crate::backend::Scheduler;
use crate::config::{self, StepRecord};
use crate::step::{ConfigField, ExtraArgs, Step, StepConfig};
use crate::steps::ConvertStep;
use crate::target::Target;
use eyre::bail;

/// Converts vendor mass-spectrometry files to an open format
#[derive(Debug, clap::Args)]
pub struct Convert {
    /// Input files or directories
    #[clap(long = "in", short = 'i', value_name = "PATH", num_args = 1.., required = true)]
    inputs: Vec<PathBuf>,
    /// Output directories, the last one is reused for remaining inputs
    /// (defaults to each input's parent directory)
    #[clap(long = "out", short = 'o', value_name = "PATH", num_args = 1..)]
    outputs: Vec<PathBuf>,
    /// Format to convert to
    #[clap(short, long, default_value = "mzML")]
    target_format: String,
    /// Regex an input path must contain
    #[clap(long)]
    pattern: Option<String>,
    /// Required start of input file names
    #[clap(long)]
    prefix: Option<String>,
    /// Required end of input paths
    #[clap(long)]
    suffix: Option<String>,
    /// Substring that selects an input as an alternative to --pattern
    #[clap(long)]
    contains: Option<String>,
    /// Outputs smaller than this many bytes are converted again
    #[clap(long, value_name = "BYTES")]
    redo_threshold: Option<f64>,
    /// Convert everything, even inputs with valid outputs
    #[clap(long)]
    overwrite: bool,
    /// Walk input directories recursively and mirror them into the output
    #[clap(short, long)]
    nested: bool,
    /// Write <name>_log.txt next to the outputs
    #[clap(short, long)]
    save_log: bool,
    /// How parallel conversions run
    #[clap(long)]
    scheduler: Option<Scheduler>,
    /// Converter executable
    #[clap(long, value_name = "PATH")]
    exec: Option<String>,
    /// Load the step from a saved configuration
    #[clap(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Save the step configuration and processed files after converting
    #[clap(long, value_name = "PATH")]
    save_config: Option<PathBuf>,
    /// Arguments passed on to the converter
    #[clap(last = true)]
    args: Vec<String>,
}

impl Convert {
    pub async fn run(&self, globals: Globals) -> Result<()> {
        let record = match &self.config {
            Some(path) => Some(config::load(path)?),
            None => None,
        };
        let step_config = self.step_config(record.as_ref(), globals)?;

        let mut step = ConvertStep::new(step_config, &self.target_format)?;
        if let Some(record) = &record {
            if let Some(exec) = &record.exec_path {
                step = step.with_exec(exec);
            }
            step.core_mut()
                .restore_processed(&record.processed_in, &record.processed_out);
        }
        if let Some(exec) = &self.exec {
            step = step.with_exec(exec);
        }
        if step.core_mut().resolve_exec().await.is_none() {
            bail!(
                "{}: converter not found, set one with --exec",
                step.core().exec()
            );
        }

        let inputs = self.inputs.iter().cloned().map(Target::from).collect();
        let outputs = self.outputs.iter().cloned().map(Target::from).collect();
        let processed = step.run(inputs, outputs, ExtraArgs::new()).await?;
        for output in &processed {
            println!("{output}");
        }

        if let Some(path) = &self.save_config {
            config::save(path, &step.core().to_record())?;
            info!("saved step to {}", xx::file::display_path(path));
        }
        let failures: Vec<_> = step.core().ledger.failures().collect();
        for (input, error) in &failures {
            error!("{input}: {error}");
        }
        if !failures.is_empty() {
            bail!("{} of {} conversion(s) failed", failures.len(), processed.len());
        }
        Ok(())
    }

    /// The saved config, if any, with command-line flags applied on top. Trailing converter
    /// arguments replace the saved ones.
    fn step_config(&self, record: Option<&StepRecord>, globals: Globals) -> Result<StepConfig> {
        let mut step_config = record.map(|r| r.config.clone()).unwrap_or_default();
        step_config.update(self.changes(globals))?;
        if !self.args.is_empty() {
            step_config.additional_args = self.args.clone();
        }
        Ok(step_config)
    }

    fn changes(&self, globals: Globals) -> Vec<(ConfigField, String)> {
        let mut changes = vec![(ConfigField::Verbosity, globals.verbosity.to_string())];
        let optional = [
            (ConfigField::Pattern, self.pattern.clone()),
            (ConfigField::Prefix, self.prefix.clone()),
            (ConfigField::Suffix, self.suffix.clone()),
            (ConfigField::Contains, self.contains.clone()),
            (ConfigField::RedoThreshold, self.redo_threshold.map(|t| t.to_string())),
            (ConfigField::Scheduler, self.scheduler.map(|s| s.to_string())),
            (ConfigField::Workers, globals.jobs.map(|j| j.to_string())),
        ];
        changes.extend(
            optional
                .into_iter()
                .filter_map(|(field, value)| value.map(|v| (field, v))),
        );
        for (field, flag) in [
            (ConfigField::Overwrite, self.overwrite),
            (ConfigField::Nested, self.nested),
            (ConfigField::SaveLog, self.save_log),
        ] {
            if flag {
                changes.push((field, "true".to_string()));
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> Convert {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Convert(cmd) => *cmd,
            _ => unreachable!(),
        }
    }

    fn globals() -> Globals {
        Globals {
            verbosity: 0,
            jobs: None,
        }
    }

    fn save(path: &std::path::Path, config: StepConfig) -> StepRecord {
        let record = StepRecord {
            config,
            exec_path: None,
            processed_in: vec![],
            processed_out: vec![],
        };
        config::save(path, &record).unwrap();
        config::load(path).unwrap()
    }

    #[test]
    fn test_trailing_args_replace_saved_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msconvert.toml");
        let cmd = parse(&["pipestep", "convert", "-i", "/raw", "--", "--zlib"]);

        let mut record = save(&path, cmd.step_config(None, globals()).unwrap());
        for _ in 0..2 {
            let config = cmd.step_config(Some(&record), globals()).unwrap();
            assert_eq!(config.additional_args, vec!["--zlib".to_string()]);
            record = save(&path, config);
        }

        let without = parse(&["pipestep", "convert", "-i", "/raw"]);
        let config = without.step_config(Some(&record), globals()).unwrap();
        assert_eq!(config.additional_args, vec!["--zlib".to_string()]);
    }
}
