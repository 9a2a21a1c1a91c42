//! Git repository discovery and health.

mod porcelain;
mod scanner;

pub use porcelain::parse_porcelain;
pub use scanner::{find_repositories, GitScanner};

use serde::Serialize;
use std::path::PathBuf;

/// Working-tree health of one repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitStatus {
    pub repo_path: PathBuf,
    pub branch: String,
    /// Nothing staged, modified or untracked (ahead/behind do not count)
    pub is_clean: bool,
    pub ahead: u32,
    pub behind: u32,
    pub staged: u32,
    pub modified: u32,
    pub untracked: u32,
    /// Set when `git status` could not run; counters are then all zero
    pub error: Option<String>,
}

impl GitStatus {
    pub(crate) fn failed(repo_path: PathBuf, branch: String, error: String) -> Self {
        Self {
            repo_path,
            branch,
            error: Some(error),
            ..Self::default()
        }
    }
}
