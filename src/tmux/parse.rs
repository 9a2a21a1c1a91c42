//! Parsers for tmux's `-F` listings and process command lines.

use chrono::{DateTime, Local};

use super::{TmuxClient, TmuxSession};
use crate::duration::format_seconds;

/// `list-sessions -F` template; fields are split on `|`
pub const SESSION_FORMAT: &str =
    "#{session_name}|#{session_windows}|#{session_created}|#{session_attached}";

/// `list-clients -F` template; fields are split on `|`
pub const CLIENT_FORMAT: &str = "#{session_name}|#{window_index}|#{pane_index}|#{client_name}|#{client_termname}|#{client_created}";

const SESSION_FIELDS: usize = 4;
const CLIENT_FIELDS: usize = 6;

/// Command-line words that mark a tmux *client* invocation
const CLIENT_KEYWORDS: [&str; 3] = ["attach", "new-session", "new"];

/// Parse one `SESSION_FORMAT` line. Lines without exactly four fields, with
/// non-numeric counts, or with a creation time too far off to subtract, are
/// dropped.
///
/// `created` is rendered relative to `now`; `clients` is left empty.
pub fn parse_session_line(line: &str, now: DateTime<Local>) -> Option<TmuxSession> {
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() != SESSION_FIELDS {
        return None;
    }

    let windows = parts[1].trim().parse().ok()?;
    let created_at: i64 = parts[2].trim().parse().ok()?;
    let age = now.timestamp().checked_sub(created_at)?;

    Some(TmuxSession {
        name: parts[0].to_string(),
        windows,
        created_at,
        created: format_seconds(age, false),
        attached: parts[3] != "0",
        clients: Vec::new(),
    })
}

/// Parse one `CLIENT_FORMAT` line. Lines without exactly six fields, or with
/// non-numeric indices, are dropped.
pub fn parse_client_line(line: &str) -> Option<TmuxClient> {
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() != CLIENT_FIELDS {
        return None;
    }

    Some(TmuxClient {
        session_name: parts[0].to_string(),
        window_index: parts[1].trim().parse().ok()?,
        pane_index: parts[2].trim().parse().ok()?,
        client_name: parts[3].to_string(),
        terminal: parts[4].to_string(),
        created: parts[5].to_string(),
    })
}

/// Parse a whole listing with `parse` applied to every non-empty line.
pub fn parse_lines<T>(output: &str, parse: impl Fn(&str) -> Option<T>) -> Vec<T> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(parse)
        .collect()
}

/// Guess whether a tmux process's command line belongs to the server.
///
/// Anything without a client keyword (`attach`, `new`, `new-session`) is taken
/// for the server; so is a bare invocation of at most two words. A renamed or
/// re-worded tmux can fool this.
pub fn is_server_invocation(cmdline: &[String]) -> bool {
    if cmdline.is_empty() {
        return false;
    }
    let joined = cmdline.join(" ");
    let client_like = CLIENT_KEYWORDS.iter().any(|kw| joined.contains(kw));
    !client_like || cmdline.len() <= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.timestamp_opt(1_700_090_061, 0).unwrap()
    }

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_session_line() {
        let session = parse_session_line("work|3|1700000000|1", now()).unwrap();
        assert_eq!(session.name, "work");
        assert_eq!(session.windows, 3);
        assert_eq!(session.created_at, 1_700_000_000);
        assert_eq!(session.created, "1 day, 1 hour, 1 minute");
        assert!(session.attached);
        assert!(session.clients.is_empty());
    }

    #[test]
    fn test_session_attached_only_when_not_zero() {
        assert!(!parse_session_line("a|1|1700000000|0", now()).unwrap().attached);
        assert!(parse_session_line("a|1|1700000000|2", now()).unwrap().attached);
        assert!(parse_session_line("a|1|1700000000|", now()).unwrap().attached);
    }

    #[test]
    fn test_malformed_session_lines_dropped() {
        assert!(parse_session_line("work|3|1700000000", now()).is_none());
        assert!(parse_session_line("a|b|3|1700000000|1", now()).is_none());
        assert!(parse_session_line("work|three|1700000000|1", now()).is_none());
        assert!(parse_session_line("", now()).is_none());
        assert!(parse_session_line("a|1|-9223372036854775808|0", now()).is_none());
    }

    #[test]
    fn test_listing_skips_bad_lines() {
        let output = "main|2|1700000000|1\ntruncated|1\n\nscratch|1|1700090000|0\n";
        let sessions = parse_lines(output, |l| parse_session_line(l, now()));
        let names: Vec<&str> = sessions.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["main", "scratch"]);
        assert_eq!(sessions[1].created, "1 minute");
    }

    #[test]
    fn test_client_line() {
        let client = parse_client_line("main|0|1|/dev/pts/3|xterm-256color|1700000100").unwrap();
        assert_eq!(client.session_name, "main");
        assert_eq!(client.window_index, 0);
        assert_eq!(client.pane_index, 1);
        assert_eq!(client.client_name, "/dev/pts/3");
        assert_eq!(client.terminal, "xterm-256color");
        assert_eq!(client.created, "1700000100");

        assert!(parse_client_line("main|0|1|/dev/pts/3|xterm").is_none());
        assert!(parse_client_line("main|x|1|/dev/pts/3|xterm|1").is_none());
    }

    #[test]
    fn test_server_classification() {
        assert!(is_server_invocation(&words("tmux")));
        assert!(is_server_invocation(&words("/usr/bin/tmux -L default")));
        assert!(!is_server_invocation(&words("tmux attach -t main")));
        assert!(!is_server_invocation(&words("tmux new-session -d -s work")));
        // Short invocations are accepted even with a client keyword
        assert!(is_server_invocation(&words("tmux new")));
        assert!(!is_server_invocation(&[]));
    }
}
