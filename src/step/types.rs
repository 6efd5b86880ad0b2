//! Step configuration.
//!
//! [`StepConfig`] is the serializable description of one step. The per-channel match
//! expressions are derived state: they are never stored, never edited directly, and are
//! rebuilt by [`StepConfig::rederive`] whenever a fragment or the mandatory mapping changes.

use crate::backend::Scheduler;
use crate::error::Error;
use crate::pattern::{self, Fragments, Matcher};
use crate::{Result, env};
use eyre::WrapErr;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Passthrough arguments given to `run`. A list whose length equals the number of scheduled
/// inputs is sliced per input; anything else is handed to every input unchanged.
pub type ExtraArgs = IndexMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub name: String,
    /// Platform tag of the machine the step runs on
    pub platform: String,
    /// Process inputs again even if they were already processed or have valid output
    pub overwrite: bool,
    /// Walk input directories recursively, mirroring their layout into the output
    pub nested: bool,
    pub workers: usize,
    #[serde(flatten)]
    fragments: Fragments,
    mandatory_patterns: IndexMap<String, String>,
    pub save_log: bool,
    pub verbosity: u8,
    pub additional_args: Vec<String>,
    pub scheduler: Scheduler,
    /// Outputs smaller than this many bytes are redone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redo_threshold: Option<u64>,
    /// Regex the last non-blank line of a finished output must match
    #[serde(skip_serializing_if = "Option::is_none")]
    completion_marker: Option<String>,

    #[serde(skip)]
    matcher: Matcher,
    #[serde(skip)]
    marker: Option<Regex>,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            platform: std::env::consts::OS.to_string(),
            overwrite: false,
            nested: false,
            workers: *env::PIPESTEP_JOBS,
            fragments: Fragments::default(),
            mandatory_patterns: IndexMap::new(),
            save_log: false,
            verbosity: 1,
            additional_args: vec![],
            scheduler: Scheduler::default(),
            redo_threshold: None,
            completion_marker: None,
            matcher: Matcher::default(),
            marker: None,
        }
    }
}

impl StepConfig {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Rebuild every derived value from the stored fragments.
    pub fn rederive(&mut self) -> Result<()> {
        self.matcher
            .rebuild(&self.fragments, &self.mandatory_patterns)
            .wrap_err_with(|| format!("{}: invalid pattern", self.name))?;
        self.marker = match &self.completion_marker {
            Some(marker) => Some(
                Regex::new(marker)
                    .wrap_err_with(|| format!("{}: invalid completion marker", self.name))?,
            ),
            None => None,
        };
        Ok(())
    }

    pub fn fragments(&self) -> &Fragments {
        &self.fragments
    }

    pub fn mandatory_patterns(&self) -> &IndexMap<String, String> {
        &self.mandatory_patterns
    }

    /// Register the regex every input of `channel` must satisfy.
    pub fn set_mandatory<C: Into<String>, P: Into<String>>(
        &mut self,
        channel: C,
        pattern: P,
    ) -> Result<()> {
        self.commit(|config| {
            config
                .mandatory_patterns
                .insert(channel.into(), pattern.into());
            Ok(())
        })
    }

    pub fn completion_marker(&self) -> Option<&Regex> {
        self.marker.as_ref()
    }

    pub fn set_completion_marker(&mut self, marker: Option<String>) -> Result<()> {
        self.commit(|config| {
            config.completion_marker = marker;
            Ok(())
        })
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn is_match(&self, channel: &str, path: &Path) -> bool {
        self.matcher.is_match(channel, path)
    }

    pub fn matches_input(&self, path: &Path) -> bool {
        self.is_match(pattern::IN, path)
    }

    /// Rendered per-channel expressions.
    pub fn patterns(&self) -> IndexMap<String, String> {
        self.matcher.patterns()
    }

    pub fn get(&self, field: ConfigField) -> String {
        fn opt(value: &Option<String>) -> String {
            value.clone().unwrap_or_default()
        }
        match field {
            ConfigField::Name => self.name.clone(),
            ConfigField::Platform => self.platform.clone(),
            ConfigField::Overwrite => self.overwrite.to_string(),
            ConfigField::Nested => self.nested.to_string(),
            ConfigField::Workers => self.workers.to_string(),
            ConfigField::Pattern => opt(&self.fragments.pattern),
            ConfigField::Prefix => opt(&self.fragments.prefix),
            ConfigField::Suffix => opt(&self.fragments.suffix),
            ConfigField::Contains => opt(&self.fragments.contains),
            ConfigField::SaveLog => self.save_log.to_string(),
            ConfigField::Verbosity => self.verbosity.to_string(),
            ConfigField::AdditionalArgs => shell_words::join(&self.additional_args),
            ConfigField::Scheduler => self.scheduler.to_string(),
            ConfigField::RedoThreshold => self
                .redo_threshold
                .map(|t| t.to_string())
                .unwrap_or_default(),
            ConfigField::CompletionMarker => opt(&self.completion_marker),
        }
    }

    /// Set one field from its string form and re-derive.
    pub fn set(&mut self, field: ConfigField, value: &str) -> Result<()> {
        self.commit(|config| config.assign(field, value))
    }

    /// Set a field chosen at runtime by name.
    pub fn set_named(&mut self, field: &str, value: &str) -> Result<()> {
        let field =
            ConfigField::from_str(field).map_err(|_| Error::UnknownField(field.to_string()))?;
        self.set(field, value)
    }

    /// Apply many changes, re-deriving once at the end.
    pub fn update<I, V>(&mut self, changes: I) -> Result<()>
    where
        I: IntoIterator<Item = (ConfigField, V)>,
        V: AsRef<str>,
    {
        self.commit(|config| {
            for (field, value) in changes {
                config.assign(field, value.as_ref())?;
            }
            Ok(())
        })
    }

    /// Apply `change` to a copy and keep it only if it re-derives, so a rejected change
    /// leaves the stored fields and the derived matcher untouched.
    fn commit<F>(&mut self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let mut candidate = self.clone();
        change(&mut candidate)?;
        candidate.rederive()?;
        *self = candidate;
        Ok(())
    }

    fn assign(&mut self, field: ConfigField, value: &str) -> Result<()> {
        fn opt(value: &str) -> Option<String> {
            (!value.is_empty()).then(|| value.to_string())
        }
        let invalid = || format!("invalid value for {field}: `{value}`");
        match field {
            ConfigField::Name => self.name = value.to_string(),
            ConfigField::Platform => self.platform = value.to_string(),
            ConfigField::Overwrite => {
                self.overwrite = value.parse::<bool>().wrap_err_with(invalid)?
            }
            ConfigField::Nested => self.nested = value.parse::<bool>().wrap_err_with(invalid)?,
            ConfigField::Workers => {
                self.workers = value.parse::<usize>().wrap_err_with(invalid)?.max(1)
            }
            ConfigField::Pattern => self.fragments.pattern = opt(value),
            ConfigField::Prefix => self.fragments.prefix = opt(value),
            ConfigField::Suffix => self.fragments.suffix = opt(value),
            ConfigField::Contains => self.fragments.contains = opt(value),
            ConfigField::SaveLog => self.save_log = value.parse::<bool>().wrap_err_with(invalid)?,
            ConfigField::Verbosity => self.verbosity = value.parse::<u8>().wrap_err_with(invalid)?,
            ConfigField::AdditionalArgs => {
                self.additional_args = shell_words::split(value).wrap_err_with(invalid)?
            }
            ConfigField::Scheduler => {
                self.scheduler = value.parse::<Scheduler>().wrap_err_with(invalid)?
            }
            ConfigField::RedoThreshold => {
                self.redo_threshold = match value {
                    "" => None,
                    // thresholds are often written as floats, e.g. 1e8
                    v => Some(v.parse::<f64>().wrap_err_with(invalid)? as u64),
                }
            }
            ConfigField::CompletionMarker => self.completion_marker = opt(value),
        }
        Ok(())
    }
}

/// The closed set of fields that can be chosen at runtime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum ConfigField {
    Name,
    Platform,
    Overwrite,
    Nested,
    Workers,
    Pattern,
    Prefix,
    Suffix,
    Contains,
    SaveLog,
    Verbosity,
    AdditionalArgs,
    Scheduler,
    RedoThreshold,
    CompletionMarker,
}
