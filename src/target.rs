use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// An input or output location: one path, a list of paths, or a channel-keyed mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Path(PathBuf),
    List(Vec<PathBuf>),
    Channels(BTreeMap<String, PathBuf>),
}

impl Target {
    /// Every path this target refers to, in order.
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            Target::Path(path) => vec![path.as_path()],
            Target::List(paths) => paths.iter().map(PathBuf::as_path).collect(),
            Target::Channels(paths) => paths.values().map(PathBuf::as_path).collect(),
        }
    }

    /// The representative path used to decide how a target is traversed.
    pub fn first(&self) -> Option<&Path> {
        self.paths().into_iter().next()
    }

    pub fn channel(&self, channel: &str) -> Option<&Path> {
        match self {
            Target::Channels(paths) => paths.get(channel).map(PathBuf::as_path),
            _ => None,
        }
    }

    /// The directory holding the representative path.
    pub fn parent(&self) -> Target {
        let parent = self
            .first()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Target::Path(parent)
    }

    /// Flat string form used when persisting processed sequences.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Path(path) => write!(f, "{}", path.display()),
            Target::List(paths) => {
                let paths: Vec<_> = paths.iter().map(|p| p.display().to_string()).collect();
                write!(f, "{}", paths.join(", "))
            }
            Target::Channels(paths) => {
                let paths: Vec<_> = paths
                    .iter()
                    .map(|(channel, p)| format!("{channel}={}", p.display()))
                    .collect();
                write!(f, "{}", paths.join(", "))
            }
        }
    }
}

impl From<PathBuf> for Target {
    fn from(path: PathBuf) -> Self {
        Target::Path(path)
    }
}

impl From<&Path> for Target {
    fn from(path: &Path) -> Self {
        Target::Path(path.to_path_buf())
    }
}

impl From<&str> for Target {
    fn from(path: &str) -> Self {
        Target::Path(PathBuf::from(path))
    }
}

impl From<Vec<PathBuf>> for Target {
    fn from(paths: Vec<PathBuf>) -> Self {
        Target::List(paths)
    }
}

impl From<BTreeMap<String, PathBuf>> for Target {
    fn from(paths: BTreeMap<String, PathBuf>) -> Self {
        Target::Channels(paths)
    }
}
