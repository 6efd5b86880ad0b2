//! Persisting a step's configuration together with what it has processed.
//!
//! The format follows the file extension: `.toml`, `.yaml`/`.yml` or `.json`.

use crate::Result;
use crate::step::StepConfig;
use eyre::{WrapErr, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    #[serde(flatten)]
    pub config: StepConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_path: Option<String>,
    /// Processed inputs as labels, index-aligned with `processed_out`
    #[serde(default)]
    pub processed_in: Vec<String>,
    #[serde(default)]
    pub processed_out: Vec<String>,
}

pub fn load(path: &Path) -> Result<StepRecord> {
    let ext = extension(path);
    let raw = xx::file::read_to_string(path)?;
    let mut record: StepRecord = match ext.as_str() {
        "toml" => toml::from_str(&raw)?,
        "yaml" | "yml" => serde_yaml::from_str(&raw)?,
        "json" => serde_json::from_str(&raw)?,
        _ => bail!("Unsupported file extension: {}", ext),
    };
    record
        .config
        .rederive()
        .wrap_err_with(|| format!("invalid step config {}", xx::file::display_path(path)))?;
    if record.processed_in.len() != record.processed_out.len() {
        bail!(
            "{}: processed_in has {} entries but processed_out has {}",
            xx::file::display_path(path),
            record.processed_in.len(),
            record.processed_out.len()
        );
    }
    Ok(record)
}

pub fn save(path: &Path, record: &StepRecord) -> Result<()> {
    let ext = extension(path);
    let raw = match ext.as_str() {
        "toml" => toml::to_string(record)?,
        "yaml" | "yml" => serde_yaml::to_string(record)?,
        "json" => serde_json::to_string_pretty(record)?,
        _ => bail!("Unsupported file extension: {}", ext),
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        xx::file::mkdirp(parent)?;
    }
    xx::file::write(path, raw)?;
    debug!("saved {}", xx::file::display_path(path));
    Ok(())
}

fn extension(path: &Path) -> String {
    path.extension()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::ConfigField;
    use pretty_assertions::assert_eq;

    fn record() -> StepRecord {
        let mut config = StepConfig::new("msconvert");
        config
            .update([
                (ConfigField::Suffix, ".raw"),
                (ConfigField::Workers, "3"),
                (ConfigField::RedoThreshold, "1e8"),
            ])
            .unwrap();
        config.set_mandatory("in_folder", r".*\.d$").unwrap();
        StepRecord {
            config,
            exec_path: Some("msconvert".to_string()),
            processed_in: vec!["/data/a.raw".to_string()],
            processed_out: vec!["/out".to_string()],
        }
    }

    #[test]
    fn test_save_and_load_each_format() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["step.toml", "step.yaml", "step.json"] {
            let path = dir.path().join(name);
            save(&path, &record()).unwrap();
            let loaded = load(&path).unwrap();
            assert_eq!(loaded.config.name, "msconvert", "{name}");
            assert_eq!(loaded.config.workers, 3);
            assert_eq!(loaded.config.redo_threshold, Some(100_000_000));
            assert_eq!(loaded.exec_path.as_deref(), Some("msconvert"));
            assert_eq!(loaded.processed_in, vec!["/data/a.raw".to_string()]);
            assert_eq!(loaded.config.patterns(), record().config.patterns());
            assert!(loaded.config.is_match("in_folder", Path::new("/x/s.d")));
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("step.ini");
        assert!(save(&path, &record()).is_err());
        std::fs::write(&path, "name = x").unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn test_load_misaligned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("step.json");
        std::fs::write(
            &path,
            r#"{"name": "x", "processed_in": ["a", "b"], "processed_out": ["o"]}"#,
        )
        .unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn test_load_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("step.yaml");
        std::fs::write(&path, "name: minimal\nprefix: A\n").unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.config.verbosity, 1);
        assert!(!loaded.config.overwrite);
        assert!(loaded.config.matches_input(Path::new("/d/A1.raw")));
        assert!(!loaded.config.matches_input(Path::new("/d/B1.raw")));
        assert!(loaded.processed_out.is_empty());
    }
}
