//! Vendor mass-spectrometry formats to open formats with an msconvert-style converter.
//!
//! The output layout mirrors the input: every input file or vendor folder becomes
//! `<out_dir>/<stem><target format>`. A finished output ends with a closing XML tag, so an
//! output that is small or lacks one is converted again.

use super::change_case_named;
use crate::Result;
use crate::command::CommandSpec;
use crate::pattern::{IN, IN_FOLDER};
use crate::step::{ExtraArgs, PipeStep, Step, StepConfig, replace_file_ending};
use crate::target::Target;
use eyre::{WrapErr, bail};
use std::path::{Path, PathBuf};

/// Extensions the converter reads.
pub const VALID_FORMATS: &[&str] = &[
    "raw", "d", "lcd", "t2d", "baf", "fid", "tdf", "tsf", "wiff", "wiff2", "yep", "mzML", "mzXML",
    "imzML",
];
/// Vendor formats stored as directories.
pub const VALID_FOLDER_FORMATS: &[&str] = &["raw", "d"];
pub const REDO_THRESHOLD: u64 = 100_000_000;
pub const COMPLETION_MARKER: &str = "^</.*>$";
/// Case applied to the format name after `.mz`
const FORMAT_CASE: &str = "upper";

#[derive(Debug)]
pub struct ConvertStep {
    core: PipeStep,
    target_format: String,
}

impl ConvertStep {
    pub fn new(mut config: StepConfig, target_format: &str) -> Result<Self> {
        if config.name.is_empty() {
            config.name = "msconvert".to_string();
        }
        config.set_mandatory(IN, format!(r".*\.({})$", VALID_FORMATS.join("|")))?;
        config.set_mandatory(
            IN_FOLDER,
            format!(r".*\.({})$", VALID_FOLDER_FORMATS.join("|")),
        )?;
        if config.redo_threshold.is_none() {
            config.redo_threshold = Some(REDO_THRESHOLD);
        }
        if config.completion_marker().is_none() {
            config.set_completion_marker(Some(COMPLETION_MARKER.to_string()))?;
        }
        let mut core = PipeStep::new(config, Some("msconvert".to_string()))?;
        core.common_execs = vec!["msconvert".to_string(), "msconvert.exe".to_string()];
        Ok(Self {
            core,
            target_format: normalize_format(target_format)?,
        })
    }

    pub fn with_exec<S: Into<String>>(mut self, exec_path: S) -> Self {
        self.core.exec_path = Some(exec_path.into());
        self
    }

    /// The output extension, e.g. `.mzML`.
    pub fn target_format(&self) -> &str {
        &self.target_format
    }

    fn command(
        &self,
        input: &Path,
        out_dir: &Path,
        out_name: &str,
        args: &ExtraArgs,
    ) -> Result<CommandSpec> {
        let config = &self.core.config;
        let format = self.target_format.trim_start_matches('.');
        let spec = CommandSpec::new(self.core.exec())
            .arg(format!("--{format}"))
            .arg("-e")
            .arg(&self.target_format)
            .arg("--64")
            .arg("-o")
            .path_arg(out_dir)
            .arg("--outfile")
            .arg(out_name)
            .path_arg(input)
            .args(config.additional_args.iter().cloned())
            .args(passthrough_args(args)?)
            .verbosity(config.verbosity);
        Ok(spec)
    }
}

/// `mzml` → `.mzML`, `.mzxml` → `.mzXML`
pub fn normalize_format(format: &str) -> Result<String> {
    let format = format.trim();
    if format.trim_start_matches('.').is_empty() {
        bail!("target format is empty");
    }
    let dotted = if format.starts_with('.') {
        format.to_string()
    } else {
        format!(".{format}")
    };
    change_case_named(&dotted, 3, FORMAT_CASE)
}

/// Extra converter arguments handed to `run` under `additional_args`, as a shell string or a
/// list of strings.
fn passthrough_args(args: &ExtraArgs) -> Result<Vec<String>> {
    match args.get("additional_args") {
        None | Some(serde_json::Value::Null) => Ok(vec![]),
        Some(serde_json::Value::String(raw)) => {
            shell_words::split(raw).wrap_err_with(|| format!("invalid additional_args: {raw}"))
        }
        Some(serde_json::Value::Array(values)) => Ok(values
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()),
        Some(other) => bail!("invalid additional_args: {other}"),
    }
}

impl Step for ConvertStep {
    fn core(&self) -> &PipeStep {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PipeStep {
        &mut self.core
    }

    fn planned_output(&self, entry: &Path, out_dir: &Path) -> PathBuf {
        let name = entry.file_name().unwrap_or_default();
        out_dir.join(replace_file_ending(name, &self.target_format))
    }

    async fn run_single(
        &mut self,
        input: &Target,
        output: &Target,
        args: &ExtraArgs,
    ) -> Result<()> {
        let (Some(in_path), Some(out_dir)) = (input.first(), output.first()) else {
            return Ok(());
        };
        let out_file = self.planned_output(in_path, out_dir);
        let out_name = out_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let spec = self
            .command(in_path, out_dir, &out_name, args)?
            .log_path(self.core.log_path(&out_file));
        let log_path = spec.log_path.clone();
        verbose!(2, self.core.config.verbosity, "converting {in_path:?} -> {out_file:?}");
        self.core
            .compute(spec.into_work(), input.clone(), Target::from(out_file), log_path)
            .await;
        Ok(())
    }

    async fn run_directory(
        &mut self,
        input: &Target,
        output: &Target,
        args: &ExtraArgs,
    ) -> Result<()> {
        self.scan_directory(input, output, args).await
    }

    async fn run_nested(
        &mut self,
        input: &Target,
        output: &Target,
        args: &ExtraArgs,
    ) -> Result<()> {
        self.descend(input, output, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::ConfigField;

    #[test]
    fn test_normalize_format() {
        assert_eq!(normalize_format("mzML").unwrap(), ".mzML");
        assert_eq!(normalize_format("mzml").unwrap(), ".mzML");
        assert_eq!(normalize_format(".mzxml").unwrap(), ".mzXML");
        assert!(normalize_format(".").is_err());
    }

    #[test]
    fn test_mandatory_patterns() {
        let step = ConvertStep::new(StepConfig::default(), "mzML").unwrap();
        let config = &step.core().config;
        assert_eq!(config.name, "msconvert");
        assert!(config.matches_input(Path::new("/d/run1.raw")));
        assert!(config.matches_input(Path::new("/d/run1.wiff2")));
        assert!(!config.matches_input(Path::new("/d/notes.txt")));
        assert!(config.is_match(IN_FOLDER, Path::new("/d/run2.d")));
        assert!(!config.is_match(IN_FOLDER, Path::new("/d/run2.wiff")));
        assert_eq!(config.redo_threshold, Some(REDO_THRESHOLD));
    }

    #[test]
    fn test_user_fragments_combine_with_mandatory() {
        let mut config = StepConfig::default();
        config.set(ConfigField::Prefix, "QC").unwrap();
        let step = ConvertStep::new(config, "mzML").unwrap();
        let config = &step.core().config;
        assert!(config.matches_input(Path::new("/d/QC_01.raw")));
        assert!(!config.matches_input(Path::new("/d/S_01.raw")));
        assert!(!config.matches_input(Path::new("/d/QC_01.txt")));
    }

    #[test]
    fn test_command_line() {
        let mut config = StepConfig::default();
        config.set(ConfigField::AdditionalArgs, "--zlib").unwrap();
        let step = ConvertStep::new(config, "mzxml").unwrap();
        let args = ExtraArgs::from([(
            "additional_args".to_string(),
            serde_json::json!("--filter 'peakPicking true 1-'"),
        )]);
        let spec = step
            .command(Path::new("/in/a.raw"), Path::new("/out"), "a.mzXML", &args)
            .unwrap();
        assert_eq!(spec.program, "msconvert");
        assert_eq!(
            spec.args,
            vec![
                "--mzXML",
                "-e",
                ".mzXML",
                "--64",
                "-o",
                "/out",
                "--outfile",
                "a.mzXML",
                "/in/a.raw",
                "--zlib",
                "--filter",
                "peakPicking true 1-",
            ]
        );
    }

    #[test]
    fn test_planned_output() {
        let step = ConvertStep::new(StepConfig::default(), "mzML").unwrap();
        assert_eq!(
            step.planned_output(Path::new("/in/run.d"), Path::new("/out")),
            PathBuf::from("/out/run.mzML")
        );
    }
}
