use std::path::PathBuf;

use super::Globals;
use crate::Result;
use crate::nester::PathNester;

/// Prints paths folded into a directory tree as JSON
#[derive(Debug, clap::Args)]
pub struct Tree {
    /// Paths to fold
    #[clap(required = true)]
    paths: Vec<PathBuf>,
    /// Trailing path components collapsed into one terminal node
    #[clap(short, long, default_value_t = 1)]
    depth: usize,
    /// Skip single-child directories at the top of the tree
    #[clap(long)]
    prune: bool,
}

impl Tree {
    pub async fn run(&self, _globals: Globals) -> Result<()> {
        let mut nester = PathNester::new(self.depth);
        let mut tree = vec![];
        nester.insert(&mut tree, &self.paths);
        let tree = if self.prune {
            PathNester::prune(&tree)
        } else {
            tree.as_slice()
        };
        println!("{}", serde_json::to_string_pretty(tree)?);
        Ok(())
    }
}
