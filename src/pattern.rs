//! Channel-keyed path matching.
//!
//! A step selects its inputs through named channels (`in` for files, `in_folder` for
//! directories that are themselves inputs). Every channel's expression is composed from the
//! same set of [`Fragments`] plus an optional mandatory regex registered for that channel:
//!
//! 1. the literal `pattern` regex, if any
//! 2. OR "contains `contains`"
//! 3. AND "ends with `suffix`"
//! 4. AND "starts with `prefix`"
//! 5. AND the channel's mandatory regex (alone if nothing else is set)
//!
//! A channel with no fragments and no mandatory regex matches everything.

use crate::Result;
use eyre::WrapErr;
use indexmap::IndexMap;
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The default channel for file inputs.
pub const IN: &str = "in";
/// Channel for directories that are processed as a single input.
pub const IN_FOLDER: &str = "in_folder";

/// The independent pieces a match expression is composed from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragments {
    /// Literal regex, searched anywhere in the path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Required start of the file name. Unlike the other fragments it is not tested against
    /// the full path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Required end of the path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    /// Alternative substring match, OR'ed with `pattern`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
}

impl Fragments {
    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
            && self.prefix.is_none()
            && self.suffix.is_none()
            && self.contains.is_none()
    }
}

/// A composed boolean test against a path.
#[derive(Debug, Clone)]
pub enum MatchExpr {
    Any,
    Regex(Regex),
    Contains(String),
    EndsWith(String),
    /// Anchored at the start of the file name rather than the full path, so that absolute
    /// directory entries can still be selected by prefix.
    StartsWith(String),
    AnyOf(Vec<MatchExpr>),
    AllOf(Vec<MatchExpr>),
}

impl MatchExpr {
    pub fn is_match(&self, path: &Path) -> bool {
        let full = path.to_string_lossy();
        match self {
            MatchExpr::Any => true,
            MatchExpr::Regex(re) => re.is_match(&full),
            MatchExpr::Contains(s) => full.contains(s.as_str()),
            MatchExpr::EndsWith(s) => full.ends_with(s.as_str()),
            MatchExpr::StartsWith(s) => match path.file_name() {
                Some(name) => name.to_string_lossy().starts_with(s.as_str()),
                None => full.starts_with(s.as_str()),
            },
            MatchExpr::AnyOf(exprs) => exprs.iter().any(|e| e.is_match(path)),
            MatchExpr::AllOf(exprs) => exprs.iter().all(|e| e.is_match(path)),
        }
    }

    fn or(self, other: MatchExpr) -> MatchExpr {
        match self {
            MatchExpr::AnyOf(mut exprs) => {
                exprs.push(other);
                MatchExpr::AnyOf(exprs)
            }
            expr => MatchExpr::AnyOf(vec![expr, other]),
        }
    }

    fn and(self, other: MatchExpr) -> MatchExpr {
        match self {
            MatchExpr::AllOf(mut exprs) => {
                exprs.push(other);
                MatchExpr::AllOf(exprs)
            }
            expr => MatchExpr::AllOf(vec![expr, other]),
        }
    }
}

impl fmt::Display for MatchExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchExpr::Any => write!(f, "*"),
            MatchExpr::Regex(re) => write!(f, "/{}/", re.as_str()),
            MatchExpr::Contains(s) => write!(f, "contains({s:?})"),
            MatchExpr::EndsWith(s) => write!(f, "ends_with({s:?})"),
            MatchExpr::StartsWith(s) => write!(f, "starts_with({s:?})"),
            MatchExpr::AnyOf(exprs) => write!(f, "({})", exprs.iter().join(" | ")),
            MatchExpr::AllOf(exprs) => write!(f, "({})", exprs.iter().join(" & ")),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).wrap_err_with(|| format!("invalid pattern: {pattern}"))
}

/// Compose the expression for one channel.
pub fn compose(fragments: &Fragments, mandatory: Option<&str>) -> Result<MatchExpr> {
    let mut expr = match &fragments.pattern {
        Some(pattern) => Some(MatchExpr::Regex(compile(pattern)?)),
        None => None,
    };
    if let Some(contains) = &fragments.contains {
        let contains = MatchExpr::Contains(contains.clone());
        expr = Some(match expr {
            Some(expr) => expr.or(contains),
            None => contains,
        });
    }
    if let Some(suffix) = &fragments.suffix {
        let suffix = MatchExpr::EndsWith(suffix.clone());
        expr = Some(match expr {
            Some(expr) => expr.and(suffix),
            None => suffix,
        });
    }
    if let Some(prefix) = &fragments.prefix {
        let prefix = MatchExpr::StartsWith(prefix.clone());
        expr = Some(match expr {
            Some(expr) => expr.and(prefix),
            None => prefix,
        });
    }
    if let Some(mandatory) = mandatory {
        let mandatory = MatchExpr::Regex(compile(mandatory)?);
        expr = Some(match expr {
            Some(MatchExpr::AllOf(mut exprs)) => {
                exprs.insert(0, mandatory);
                MatchExpr::AllOf(exprs)
            }
            Some(expr) => MatchExpr::AllOf(vec![mandatory, expr]),
            None => mandatory,
        });
    }
    Ok(expr.unwrap_or(MatchExpr::Any))
}

/// The derived channel → expression mapping.
///
/// Never edited directly: [`Matcher::rebuild`] recomposes every known channel whenever the
/// fragments or the mandatory mapping change.
#[derive(Debug, Clone)]
pub struct Matcher {
    exprs: IndexMap<String, MatchExpr>,
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            exprs: IndexMap::from([(IN.to_string(), MatchExpr::Any)]),
        }
    }
}

impl Matcher {
    pub fn new(fragments: &Fragments, mandatory: &IndexMap<String, String>) -> Result<Self> {
        let mut matcher = Self::default();
        matcher.rebuild(fragments, mandatory)?;
        Ok(matcher)
    }

    /// Recompose every channel that has a mandatory regex or an existing expression.
    pub fn rebuild(
        &mut self,
        fragments: &Fragments,
        mandatory: &IndexMap<String, String>,
    ) -> Result<()> {
        let channels = mandatory
            .keys()
            .chain(self.exprs.keys())
            .cloned()
            .unique()
            .collect_vec();
        let mut exprs = IndexMap::with_capacity(channels.len());
        for channel in channels {
            let expr = compose(fragments, mandatory.get(&channel).map(String::as_str))
                .wrap_err_with(|| format!("channel {channel}"))?;
            exprs.insert(channel, expr);
        }
        self.exprs = exprs;
        Ok(())
    }

    /// Whether `path` matches `channel`. Unregistered channels match nothing.
    pub fn is_match(&self, channel: &str, path: &Path) -> bool {
        self.exprs
            .get(channel)
            .map(|expr| expr.is_match(path))
            .unwrap_or(false)
    }

    /// Rendered form of every channel's expression.
    pub fn patterns(&self) -> IndexMap<String, String> {
        self.exprs
            .iter()
            .map(|(channel, expr)| (channel.clone(), expr.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fragments(prefix: Option<&str>, suffix: Option<&str>, contains: Option<&str>) -> Fragments {
        Fragments {
            pattern: None,
            prefix: prefix.map(String::from),
            suffix: suffix.map(String::from),
            contains: contains.map(String::from),
        }
    }

    fn admitted(expr: &MatchExpr, paths: &[PathBuf]) -> usize {
        paths.iter().filter(|p| expr.is_match(p)).count()
    }

    #[test]
    fn test_default_channel_matches_everything() {
        let matcher = Matcher::default();
        assert!(matcher.is_match(IN, Path::new("/anything/at/all.bin")));
        assert!(!matcher.is_match(IN_FOLDER, Path::new("/anything")));
    }

    #[test]
    fn test_all_fragments_required() {
        let expr = compose(&fragments(Some("A"), Some(".txt"), Some("mid")), None).unwrap();
        assert!(expr.is_match(Path::new("/data/A_mid_1.txt")));
        assert!(!expr.is_match(Path::new("/data/B_mid_1.txt")));
        assert!(!expr.is_match(Path::new("/data/A_mid_1.csv")));
        assert!(!expr.is_match(Path::new("/data/A_top_1.txt")));
    }

    #[test]
    fn test_removing_a_fragment_admits_more() {
        let paths = [
            "/d/A_mid.txt",
            "/d/B_mid.txt",
            "/d/A_mid.csv",
            "/d/A_top.txt",
            "/d/Z.bin",
        ]
        .map(PathBuf::from);
        let all = compose(&fragments(Some("A"), Some(".txt"), Some("mid")), None).unwrap();
        let baseline = admitted(&all, &paths);
        for reduced in [
            fragments(None, Some(".txt"), Some("mid")),
            fragments(Some("A"), None, Some("mid")),
            fragments(Some("A"), Some(".txt"), None),
        ] {
            let expr = compose(&reduced, None).unwrap();
            assert!(admitted(&expr, &paths) > baseline, "{expr} should admit more");
        }
    }

    #[test]
    fn test_contains_is_alternative_to_pattern() {
        let f = Fragments {
            pattern: Some(r"\.raw$".to_string()),
            contains: Some("blank".to_string()),
            ..Default::default()
        };
        let expr = compose(&f, None).unwrap();
        assert!(expr.is_match(Path::new("run1.raw")));
        assert!(expr.is_match(Path::new("blank_03.mzML")));
        assert!(!expr.is_match(Path::new("run1.mzML")));
    }

    #[test]
    fn test_mandatory_alone() {
        let expr = compose(&Fragments::default(), Some(r"\.(raw|d)$")).unwrap();
        assert!(matches!(expr, MatchExpr::Regex(_)));
        assert!(expr.is_match(Path::new("sample.d")));
        assert!(!expr.is_match(Path::new("sample.mzML")));
    }

    #[test]
    fn test_mandatory_always_required() {
        let f = Fragments {
            contains: Some("QC".to_string()),
            ..Default::default()
        };
        let expr = compose(&f, Some(r"\.raw$")).unwrap();
        assert!(expr.is_match(Path::new("/x/QC_01.raw")));
        assert!(!expr.is_match(Path::new("/x/QC_01.txt")));
        assert!(!expr.is_match(Path::new("/x/S_01.raw")));
    }

    #[test]
    fn test_rebuild_tracks_fragment_changes() {
        let mandatory = IndexMap::from([(IN_FOLDER.to_string(), r"\.d$".to_string())]);
        let mut matcher = Matcher::new(&Fragments::default(), &mandatory).unwrap();
        assert!(matcher.is_match(IN, Path::new("x.csv")));

        let narrowed = fragments(None, Some(".raw"), None);
        matcher.rebuild(&narrowed, &mandatory).unwrap();
        assert!(!matcher.is_match(IN, Path::new("x.csv")));
        assert!(matcher.is_match(IN, Path::new("x.raw")));
        // the folder channel gets the fragments too, on top of its mandatory part
        assert!(!matcher.is_match(IN_FOLDER, Path::new("x.d")));

        matcher.rebuild(&Fragments::default(), &mandatory).unwrap();
        assert!(matcher.is_match(IN, Path::new("x.csv")));
        assert!(matcher.is_match(IN_FOLDER, Path::new("x.d")));
    }

    #[test]
    fn test_invalid_regex() {
        let f = Fragments {
            pattern: Some("(".to_string()),
            ..Default::default()
        };
        assert!(compose(&f, None).is_err());
    }

    #[test]
    fn test_display() {
        let expr = compose(&fragments(Some("A"), Some(".txt"), None), Some("x")).unwrap();
        assert_eq!(
            expr.to_string(),
            r#"(/x/ & ends_with(".txt") & starts_with("A"))"#
        );
    }
}
