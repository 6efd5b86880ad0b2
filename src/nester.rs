//! Folding flat path lists into a labeled directory tree.
//!
//! Used for hierarchical selection of inputs: directories become nodes labeled with their
//! name, and the last `nesting_depth` components of each path collapse into a terminal node
//! labeled with the full path, which keeps repeat insertions idempotent.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub children: Vec<PathNode>,
}

impl PathNode {
    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }
}

/// Owns the id counter for one tree; ids are unique per nester, not per process.
#[derive(Debug)]
pub struct PathNester {
    nesting_depth: usize,
    id_counter: u64,
}

impl Default for PathNester {
    fn default() -> Self {
        Self::new(1)
    }
}

impl PathNester {
    pub fn new(nesting_depth: usize) -> Self {
        Self {
            nesting_depth: nesting_depth.max(1),
            id_counter: 0,
        }
    }

    fn next_id(&mut self) -> String {
        self.id_counter += 1;
        self.id_counter.to_string()
    }

    /// Fold every path into `tree`.
    pub fn insert<I, P>(&mut self, tree: &mut Vec<PathNode>, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            let (complete, components) = normalize(path.as_ref());
            trace!("nesting {complete} ({} components)", components.len());
            self.fold(&components, tree, &complete);
        }
    }

    fn fold(&mut self, steps: &[String], level: &mut Vec<PathNode>, complete: &str) {
        let id = self.next_id();
        if steps.len() <= self.nesting_depth {
            if !level.iter().any(|node| node.label == complete) {
                level.push(PathNode {
                    id,
                    label: complete.to_string(),
                    children: vec![],
                });
            }
            return;
        }
        let step = &steps[0];
        if let Some(node) = level.iter_mut().find(|node| &node.label == step) {
            self.fold(&steps[1..], &mut node.children, complete);
        } else {
            let mut node = PathNode {
                id,
                label: step.clone(),
                children: vec![],
            };
            self.fold(&steps[1..], &mut node.children, complete);
            level.push(node);
        }
    }

    /// Skip the chain of single-child roots down to the first level that branches.
    pub fn prune(mut tree: &[PathNode]) -> &[PathNode] {
        while let [root] = tree
            && root.children.len() == 1
        {
            tree = &root.children;
        }
        tree
    }
}

/// Normalize separators and `.`/`..` components; returns the full path string and the
/// components below the root.
fn normalize(path: &Path) -> (String, Vec<String>) {
    let unified = PathBuf::from(path.to_string_lossy().replace('\\', "/"));
    let mut full = PathBuf::new();
    let mut components: Vec<String> = vec![];
    for component in unified.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => full.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if components.pop().is_some() {
                    full.pop();
                } else {
                    full.push("..");
                    components.push("..".to_string());
                }
            }
            Component::Normal(name) => {
                full.push(name);
                components.push(name.to_string_lossy().to_string());
            }
        }
    }
    (full.to_string_lossy().to_string(), components)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(nodes: &[PathNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.label.as_str()).collect()
    }

    fn count_terminals(nodes: &[PathNode], label: &str) -> usize {
        nodes
            .iter()
            .map(|n| {
                let own = usize::from(n.is_terminal() && n.label == label);
                own + count_terminals(&n.children, label)
            })
            .sum()
    }

    #[test]
    fn test_insert_builds_directories() {
        let mut nester = PathNester::default();
        let mut tree = vec![];
        nester.insert(&mut tree, ["/a/b/c.txt", "/a/b/d.txt", "/a/e/f.txt"]);

        assert_eq!(labels(&tree), vec!["a"]);
        assert_eq!(labels(&tree[0].children), vec!["b", "e"]);
        assert_eq!(
            labels(&tree[0].children[0].children),
            vec!["/a/b/c.txt", "/a/b/d.txt"]
        );
        assert_eq!(labels(&tree[0].children[1].children), vec!["/a/e/f.txt"]);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut nester = PathNester::default();
        let mut tree = vec![];
        nester.insert(&mut tree, ["/a/b/c.txt"]);
        nester.insert(&mut tree, ["/a/b/c.txt"]);
        assert_eq!(count_terminals(&tree, "/a/b/c.txt"), 1);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children.len(), 1);
    }

    #[test]
    fn test_nesting_depth_groups_tail() {
        let mut nester = PathNester::new(2);
        let mut tree = vec![];
        nester.insert(&mut tree, ["/a/b/c.txt"]);
        assert_eq!(labels(&tree), vec!["a"]);
        assert_eq!(labels(&tree[0].children), vec!["/a/b/c.txt"]);
    }

    #[test]
    fn test_normalizes_paths() {
        let mut nester = PathNester::default();
        let mut tree = vec![];
        nester.insert(&mut tree, ["/a/./x/../b/c.txt", "/a/b/c.txt"]);
        assert_eq!(count_terminals(&tree, "/a/b/c.txt"), 1);

        let mut tree = vec![];
        nester.insert(&mut tree, ["data\\run\\s1.raw"]);
        assert_eq!(labels(&tree), vec!["data"]);
        assert_eq!(labels(&tree[0].children), vec!["run"]);
        assert_eq!(labels(&tree[0].children[0].children), vec!["data/run/s1.raw"]);
    }

    #[test]
    fn test_ids_increase() {
        let mut nester = PathNester::default();
        let mut tree = vec![];
        nester.insert(&mut tree, ["/a/b.txt", "/c/d.txt"]);
        let first: u64 = tree[0].id.parse().unwrap();
        let second: u64 = tree[1].id.parse().unwrap();
        assert!(second > first);
    }

    fn node(label: &str, children: Vec<PathNode>) -> PathNode {
        PathNode {
            id: label.to_string(),
            label: label.to_string(),
            children,
        }
    }

    #[test]
    fn test_prune_single_chain() {
        let tree = vec![node(
            "root",
            vec![node(
                "single",
                vec![node(
                    "inner",
                    vec![node("leaf1", vec![]), node("leaf2", vec![])],
                )],
            )],
        )];
        let pruned = PathNester::prune(&tree);
        assert_eq!(labels(pruned), vec!["inner"]);
        assert_eq!(labels(&pruned[0].children), vec!["leaf1", "leaf2"]);
    }

    #[test]
    fn test_prune_keeps_branching_root() {
        let tree = vec![node(
            "root",
            vec![node("child1", vec![]), node("child2", vec![])],
        )];
        assert_eq!(PathNester::prune(&tree), tree.as_slice());
    }

    #[test]
    fn test_prune_empty_and_forest() {
        assert!(PathNester::prune(&[]).is_empty());
        let forest = vec![node("a", vec![]), node("b", vec![])];
        assert_eq!(PathNester::prune(&forest).len(), 2);
    }
}
