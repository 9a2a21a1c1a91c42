//! Parser for `git status --porcelain --branch`.

use std::path::Path;

use super::GitStatus;

const BRANCH_HEADER: &str = "## ";
const AHEAD_MARKER: &str = "[ahead ";
const BEHIND_MARKER: &str = "behind ";
const STAGED_CODES: [char; 5] = ['M', 'A', 'D', 'R', 'C'];

/// Turn porcelain v1 output into a [`GitStatus`].
///
/// The `## ` header contributes ahead/behind counts; every other non-empty
/// line is an `XY path` entry. Cleanliness ignores ahead/behind.
pub fn parse_porcelain(repo_path: &Path, branch: &str, output: &str) -> GitStatus {
    let mut status = GitStatus {
        repo_path: repo_path.to_path_buf(),
        branch: branch.to_string(),
        ..GitStatus::default()
    };

    for line in output.lines().filter(|l| !l.is_empty()) {
        if line.starts_with(BRANCH_HEADER) {
            status.ahead = count_after(line, AHEAD_MARKER);
            status.behind = count_after(line, BEHIND_MARKER);
            continue;
        }

        let mut codes = line.chars();
        let (Some(index), Some(worktree)) = (codes.next(), codes.next()) else {
            continue;
        };
        if STAGED_CODES.contains(&index) {
            status.staged += 1;
        }
        if worktree == 'M' {
            status.modified += 1;
        }
        if line.starts_with("??") {
            status.untracked += 1;
        }
    }

    status.is_clean = status.staged == 0 && status.modified == 0 && status.untracked == 0;
    status
}

/// Number right after `marker`, up to the next `]` or `,`. Zero when the
/// marker is absent or the text is not a number.
fn count_after(line: &str, marker: &str) -> u32 {
    let Some(start) = line.find(marker) else {
        return 0;
    };
    let rest = &line[start + marker.len()..];
    let end = rest.find([']', ',']).unwrap_or(rest.len());
    rest[..end].trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(output: &str) -> GitStatus {
        parse_porcelain(Path::new("/repo"), "main", output)
    }

    #[test]
    fn test_ahead_behind_and_counts() {
        let status = parse("## main...origin/main [ahead 2, behind 1]\nM  file.txt\n?? new.txt\n");
        assert_eq!(status.ahead, 2);
        assert_eq!(status.behind, 1);
        assert_eq!(status.staged, 1);
        assert_eq!(status.modified, 0);
        assert_eq!(status.untracked, 1);
        assert!(!status.is_clean);
        assert_eq!(status.branch, "main");
        assert_eq!(status.error, None);
    }

    #[test]
    fn test_empty_output_is_clean() {
        let status = parse("");
        assert_eq!((status.ahead, status.behind), (0, 0));
        assert_eq!((status.staged, status.modified, status.untracked), (0, 0, 0));
        assert!(status.is_clean);
    }

    #[test]
    fn test_only_one_direction() {
        let ahead = parse("## dev...origin/dev [ahead 7]\n");
        assert_eq!((ahead.ahead, ahead.behind), (7, 0));
        assert!(ahead.is_clean);

        let behind = parse("## dev...origin/dev [behind 12]\n");
        assert_eq!((behind.ahead, behind.behind), (0, 12));
        assert!(behind.is_clean);

        let untracked_branch = parse("## No commits yet on main\n");
        assert_eq!((untracked_branch.ahead, untracked_branch.behind), (0, 0));
    }

    #[test]
    fn test_index_and_worktree_columns() {
        let status = parse(
            "## main\nMM staged_and_modified.rs\n M worktree.rs\nA  added.rs\nD  gone.rs\nR  old.rs -> new.rs\n?? a\n?? b\n",
        );
        assert_eq!(status.staged, 4);
        assert_eq!(status.modified, 2);
        assert_eq!(status.untracked, 2);
        assert!(!status.is_clean);
    }

    #[test]
    fn test_non_numeric_counts_are_zero() {
        assert_eq!(count_after("## x [ahead many]", AHEAD_MARKER), 0);
        assert_eq!(count_after("## x [ahead 3, behind 4]", BEHIND_MARKER), 4);
    }
}
