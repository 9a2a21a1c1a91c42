use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{parse_porcelain, GitStatus};
use crate::command::{self, DEFAULT_COMMAND_TIMEOUT};

const GIT_DIR: &str = ".git";
const UNKNOWN_BRANCH: &str = "unknown";

/// Every repository root under `root`, sorted.
///
/// A repository root is the parent of a directory named `.git`. A permission
/// error anywhere in the walk abandons the scan and yields an empty list;
/// entries that vanish mid-walk are skipped.
pub fn find_repositories(root: &Path) -> Vec<PathBuf> {
    let mut repos = Vec::new();
    let mut walker = WalkDir::new(root).min_depth(1).into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if e.io_error().map(|io| io.kind()) == Some(ErrorKind::PermissionDenied) {
                    warn!(root = %root.display(), error = %e, "permission denied, abandoning repository scan");
                    return Vec::new();
                }
                debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if entry.file_type().is_dir() && entry.file_name() == GIT_DIR {
            if let Some(parent) = entry.path().parent() {
                repos.push(parent.to_path_buf());
            }
            // Nothing inside .git is a repository root
            walker.skip_current_dir();
        }
    }

    repos.sort();
    repos
}

/// Runs `git` against repositories with a per-command timeout
#[derive(Debug, Clone)]
pub struct GitScanner {
    git_path: String,
    timeout: Duration,
}

impl Default for GitScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl GitScanner {
    pub fn new() -> Self {
        Self {
            git_path: "git".to_string(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_binary(mut self, git_path: impl Into<String>) -> Self {
        self.git_path = git_path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current branch name, `"unknown"` on any failure.
    pub async fn current_branch(&self, repo: &Path) -> String {
        let repo_arg = repo.to_string_lossy();
        let args = ["-C", repo_arg.as_ref(), "rev-parse", "--abbrev-ref", "HEAD"];
        match command::run(&self.git_path, &args, self.timeout).await {
            Ok(out) if out.success() => out.stdout.trim().to_string(),
            Ok(out) => {
                debug!(repo = %repo.display(), stderr = %out.stderr.trim(), "branch lookup failed");
                UNKNOWN_BRANCH.to_string()
            }
            Err(e) => {
                debug!(repo = %repo.display(), error = %e, "branch lookup failed");
                UNKNOWN_BRANCH.to_string()
            }
        }
    }

    /// Status of one repository. Failures are reported in [`GitStatus::error`]
    /// with every counter left at zero.
    pub async fn get_status(&self, repo: &Path) -> GitStatus {
        let branch = self.current_branch(repo).await;

        let repo_arg = repo.to_string_lossy();
        let args = ["-C", repo_arg.as_ref(), "status", "--porcelain", "--branch"];
        let result = command::run(&self.git_path, &args, self.timeout)
            .await
            .and_then(|out| out.into_success(&self.git_path));

        match result {
            Ok(out) => parse_porcelain(repo, &branch, &out.stdout),
            Err(e) => {
                warn!(repo = %repo.display(), error = %e, "git status failed");
                GitStatus::failed(repo.to_path_buf(), branch, e.to_string())
            }
        }
    }

    /// Discover repositories under `root` and query each in turn.
    pub async fn scan_all(&self, root: &Path) -> Vec<GitStatus> {
        let repos = walk_blocking(root, find_repositories).await;

        let mut statuses = Vec::with_capacity(repos.len());
        for repo in &repos {
            statuses.push(self.get_status(repo).await);
        }
        statuses
    }
}

/// Run `walk` on the blocking pool. A panic in the walk is re-raised here.
async fn walk_blocking<F>(root: &Path, walk: F) -> Vec<PathBuf>
where
    F: FnOnce(&Path) -> Vec<PathBuf> + Send + 'static,
{
    let owned = root.to_path_buf();
    match tokio::task::spawn_blocking(move || walk(&owned)).await {
        Ok(repos) => repos,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => {
            warn!(root = %root.display(), error = %e, "repository walk cancelled");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn git_available() -> bool {
        which::which("git").is_ok()
    }

    #[test]
    fn test_find_repositories_sorted_parents() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for repo in ["zeta", "alpha", "nested/inner"] {
            fs::create_dir_all(root.join(repo).join(".git").join("objects")).unwrap();
        }
        fs::create_dir_all(root.join("plain/dir")).unwrap();
        // A `.git` file (worktree link) is not a repository directory
        fs::create_dir_all(root.join("worktree")).unwrap();
        fs::write(root.join("worktree/.git"), "gitdir: /elsewhere").unwrap();

        let repos = find_repositories(root);
        assert_eq!(
            repos,
            vec![root.join("alpha"), root.join("nested/inner"), root.join("zeta")]
        );
    }

    #[test]
    fn test_permission_denied_abandons_walk() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/.git")).unwrap();
        let locked = root.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root reads through mode 000, so there is nothing to deny
        let denied = fs::read_dir(&locked).is_err();
        let repos = find_repositories(root);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if denied {
            assert!(repos.is_empty());
        } else {
            assert_eq!(repos, vec![root.join("a")]);
        }
    }

    #[tokio::test]
    #[should_panic(expected = "walk exploded")]
    async fn test_walk_panic_is_not_swallowed() {
        walk_blocking(Path::new("/"), |_| panic!("walk exploded")).await;
    }

    #[test]
    fn test_missing_root_is_empty() {
        assert!(find_repositories(Path::new("/definitely/not/here")).is_empty());
    }

    #[tokio::test]
    async fn test_missing_git_binary_fills_error() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = GitScanner::new().with_binary("/nonexistent/git");

        let status = scanner.get_status(dir.path()).await;
        assert_eq!(status.branch, "unknown");
        assert!(status.error.is_some());
        assert!(!status.is_clean);
        assert_eq!(
            (status.staged, status.modified, status.untracked, status.ahead),
            (0, 0, 0, 0)
        );
    }

    #[tokio::test]
    async fn test_not_a_repository_fills_error() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let status = GitScanner::new().get_status(dir.path()).await;
        assert!(status.error.is_some());
    }

    #[tokio::test]
    async fn test_scan_real_repository() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("project");
        fs::create_dir_all(&repo).unwrap();
        let init = command::run(
            "git",
            &["-C", repo.to_str().unwrap(), "init", "-q", "-b", "main"],
            DEFAULT_COMMAND_TIMEOUT,
        )
        .await
        .unwrap();
        if !init.success() {
            // git older than 2.28 has no -b
            return;
        }
        fs::write(repo.join("untracked.txt"), "hi").unwrap();

        let statuses = GitScanner::new().scan_all(dir.path()).await;
        assert_eq!(statuses.len(), 1);
        let status = &statuses[0];
        assert_eq!(status.repo_path, repo);
        assert_eq!(status.error, None);
        assert_eq!(status.untracked, 1);
        assert!(!status.is_clean);
    }
}
