//! Most recently modified files under a directory.

use chrono::{DateTime, Local};
use ignore::WalkBuilder;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub modified: DateTime<Local>,
}

impl FileInfo {
    pub fn modified_datetime(&self) -> DateTime<Local> {
        self.modified
    }

    /// Modification time as `YYYY-mm-dd HH:MM:SS`
    pub fn modified_str(&self) -> String {
        self.modified.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// The `limit` most recently modified files under `dir`, newest first.
///
/// With `exclude_hidden`, dot-prefixed files and directories are not visited.
/// Files that cannot be stat'd are skipped.
pub fn get_recent_files(dir: &Path, limit: usize, exclude_hidden: bool) -> Vec<FileInfo> {
    let walker = WalkBuilder::new(dir)
        .hidden(exclude_hidden)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().map_or(true, |t| t.is_dir()) {
            continue;
        }

        // Follows symlinks; dangling links fail here and are dropped
        let modified = match fs::metadata(entry.path()).and_then(|meta| {
            if meta.is_file() {
                meta.modified().map(Some)
            } else {
                Ok(None)
            }
        }) {
            Ok(Some(time)) => time,
            Ok(None) => continue,
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "cannot stat");
                continue;
            }
        };

        files.push(FileInfo {
            path: entry.into_path(),
            modified: DateTime::<Local>::from(modified),
        });
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified));
    files.truncate(limit);
    files
}
