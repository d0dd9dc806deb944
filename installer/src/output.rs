//! User-facing messages.
//!
//! Everything here formats text; callers decide which stream it goes to.

use crate::cli::{TOOL_NAME, USAGE};
use crate::error::Result;
use camino::Utf8Path;
use std::io::Write;

/// Number of log lines echoed after a failed build.
pub const LOG_TAIL_LINES: usize = 10;

/// Most candidate definitions listed when a definition is unknown.
pub const MAX_CANDIDATES: usize = 10;

/// Exit status `ruby-build` uses for an unknown definition.
pub const DEFINITION_NOT_FOUND: i32 = 2;

/// Writes one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Prefixes `message` with the tool name.
#[must_use]
pub fn tool_message(message: impl std::fmt::Display) -> String {
    format!("{TOOL_NAME}: {message}")
}

/// Error line plus usage summary for a usage error.
#[must_use]
pub fn usage_error_text(message: impl std::fmt::Display) -> String {
    format!("{}\n\nusage: {USAGE}", tool_message(message))
}

/// Question asked before overwriting an existing installation.
#[must_use]
pub fn overwrite_question(prefix: &Utf8Path) -> String {
    format!("{TOOL_NAME}: {prefix} already exists. Continue with installation?")
}

/// Suggestion printed after a successful install that is not the default.
#[must_use]
pub fn default_version_note(version_name: &str) -> String {
    format!("NOTE: to make this the default, run: rbenv global {version_name}")
}

/// Message for a definition `ruby-build` does not know.
///
/// # Example
///
/// ```
/// use rb_install::output::candidate_definitions_message;
///
/// let candidates = vec!["3.2.0".to_owned(), "3.2.1".to_owned()];
/// let text = candidate_definitions_message("3.2", &candidates);
///
/// assert!(text.contains("  3.2.1"));
/// assert!(text.contains("rb-install --list"));
/// ```
#[must_use]
pub fn candidate_definitions_message(definition: &str, candidates: &[String]) -> String {
    let mut lines = Vec::new();
    let matching: Vec<&String> = candidates
        .iter()
        .filter(|candidate| candidate.contains(definition))
        .take(MAX_CANDIDATES)
        .collect();

    if !matching.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "The following versions contain `{definition}' in the name:"
        ));
        lines.extend(matching.iter().map(|candidate| format!("  {candidate}")));
    }
    lines.push(String::new());
    lines.push(format!(
        "See all available versions with `{TOOL_NAME} --list'."
    ));
    lines.push(String::new());
    lines.push("If the version you need is missing, try upgrading ruby-build:".to_owned());
    lines.push(String::new());
    lines.push(format!("  {TOOL_NAME} --update"));
    lines.join("\n")
}

/// Banner shown when `ruby-build` fails.
#[derive(Debug)]
pub struct FailureReport<'a> {
    /// The definition that failed to build.
    pub definition: &'a str,
    /// Exit status of `ruby-build`.
    pub status: i32,
    /// Log file and its last lines, when the log has content.
    pub log: Option<(&'a Utf8Path, Vec<String>)>,
}

impl FailureReport<'_> {
    /// The headline, without any log reference.
    #[must_use]
    pub fn banner(&self) -> String {
        format!("BUILD FAILED ({}, status {})", self.definition, self.status)
    }

    /// Lines following the headline.
    #[must_use]
    pub fn details(&self) -> Vec<String> {
        let Some((path, tail)) = &self.log else {
            return Vec::new();
        };
        let mut lines = vec![
            String::new(),
            format!("Results logged to {path}"),
            String::new(),
            "Last 10 log lines:".to_owned(),
        ];
        lines.extend(tail.iter().cloned());
        lines
    }
}

/// Last `count` lines of the log at `path`, or `None` when the log is empty
/// or missing.
///
/// # Errors
///
/// Returns an I/O error if the file exists but cannot be read.
pub fn log_tail(path: &Utf8Path, count: usize) -> Result<Option<Vec<String>>> {
    let contents = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if contents.is_empty() {
        return Ok(None);
    }
    let text = String::from_utf8_lossy(&contents);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    Ok(Some(lines[start..].iter().map(|&line| line.to_owned()).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn log_dir() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    fn log_path(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join("run.log")).expect("utf8 temp path")
    }

    #[test]
    fn usage_error_includes_usage_summary() {
        let text = usage_error_text("unknown option: --bogus");
        assert!(text.starts_with("rb-install: unknown option: --bogus\n"));
        assert!(text.contains("usage: rb-install"));
    }

    #[test]
    fn candidates_are_filtered_and_capped() {
        let candidates: Vec<String> = (0..20)
            .map(|patch| format!("3.2.{patch}"))
            .chain(["2.7.8".to_owned()])
            .collect();

        let text = candidate_definitions_message("3.2", &candidates);

        assert!(text.contains("contain `3.2' in the name"));
        assert_eq!(text.lines().filter(|line| line.starts_with("  3.2.")).count(), MAX_CANDIDATES);
        assert!(!text.contains("2.7.8"));
    }

    #[test]
    fn no_candidates_still_points_at_list() {
        let text = candidate_definitions_message("9.9", &["3.2.0".to_owned()]);
        assert!(!text.contains("in the name"));
        assert!(text.contains("rb-install --list"));
    }

    #[test]
    fn banner_names_definition_and_status() {
        let report = FailureReport {
            definition: "3.2.0",
            status: 1,
            log: None,
        };
        assert_eq!(report.banner(), "BUILD FAILED (3.2.0, status 1)");
        assert!(report.details().is_empty());
    }

    #[test]
    fn details_reference_log_and_tail() {
        let path = Utf8PathBuf::from("/tmp/rb-install.1.log");
        let report = FailureReport {
            definition: "3.2.0",
            status: 1,
            log: Some((&path, vec!["make: *** [all] Error 2".to_owned()])),
        };

        let details = report.details();
        assert!(details.contains(&"Results logged to /tmp/rb-install.1.log".to_owned()));
        assert_eq!(details.last().map(String::as_str), Some("make: *** [all] Error 2"));
    }

    #[rstest]
    fn log_tail_returns_last_lines(log_dir: TempDir) {
        let path = log_path(&log_dir);
        let body: String = (1..=25).map(|line| format!("line {line}\n")).collect();
        std::fs::write(&path, body).expect("write log");

        let tail = log_tail(&path, LOG_TAIL_LINES).expect("read").expect("non-empty");

        assert_eq!(tail.len(), 10);
        assert_eq!(tail.first().map(String::as_str), Some("line 16"));
        assert_eq!(tail.last().map(String::as_str), Some("line 25"));
    }

    #[rstest]
    fn empty_or_missing_log_has_no_tail(log_dir: TempDir) {
        let path = log_path(&log_dir);
        assert_eq!(log_tail(&path, LOG_TAIL_LINES).expect("missing"), None);

        std::fs::write(&path, "").expect("write empty log");
        assert_eq!(log_tail(&path, LOG_TAIL_LINES).expect("empty"), None);
    }

    #[test]
    fn note_suggests_rbenv_global() {
        assert_eq!(
            default_version_note("3.2.0"),
            "NOTE: to make this the default, run: rbenv global 3.2.0"
        );
    }
}
