use super::{Outcome, ScanState, Settings, Skip, now_rfc3339};
use crate::api::{Client, CreateSnapshotRequest};
use crate::cache::{LastSnapshot, TranscriptState};
use crate::config::Paths;
use crate::session::SessionData;
use crate::transcript;
use crate::types::{UserPromptSubmitInput, non_empty};
use anyhow::{Context, Result};
use log::debug;
use regex::RegexBuilder;
use std::path::Path;

/// Return the first skip pattern matching `prompt`, case-insensitively.
/// Patterns that aren't valid regexes are ignored.
fn matching_skip_pattern<'a>(patterns: &'a [String], prompt: &str) -> Option<&'a str> {
    patterns
        .iter()
        .find(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .is_ok_and(|re| re.is_match(prompt))
        })
        .map(String::as_str)
}

/// Pre-prompt phase: snapshot the tree as it is before the assistant runs.
pub fn run(input: &UserPromptSubmitInput, paths: &Paths) -> Result<Outcome> {
    if input.prompt.trim().is_empty() {
        return Ok(Outcome::Skipped(Skip::EmptyPrompt));
    }

    let Some(Settings {
        config,
        credentials,
    }) = Settings::load(paths)?
    else {
        return Ok(Outcome::Skipped(Skip::NotConfigured));
    };

    if !config.auto_snapshot.enabled {
        return Ok(Outcome::Skipped(Skip::AutoSnapshotDisabled));
    }
    if let Some(pattern) = matching_skip_pattern(&config.auto_snapshot.skip_patterns, &input.prompt)
    {
        return Ok(Outcome::Skipped(Skip::SkipPattern(pattern.to_string())));
    }

    let scan = ScanState::collect(paths, &config);

    let client = Client::new(&config.server_url, &credentials.api_key)?;
    let request = CreateSnapshotRequest {
        project_hash: &credentials.current_project_hash,
        message: format!("[AUTO-PRE] {}", input.prompt),
        changes: &scan.changes,
        claude_session_id: Some(input.session_id.as_str()).filter(|s| !s.is_empty()),
        parent_snapshot_id: scan.last.as_ref().and_then(LastSnapshot::parent_id),
    };
    let response = client
        .create_snapshot(&request)
        .context("posting pre snapshot")?;
    let snapshot_id = response.snapshot_id.into_string();
    debug!("pre snapshot {snapshot_id} created at {}", response.created_at);

    // Everything already in the transcript belongs to earlier turns.
    let transcript = match non_empty(&input.transcript_path) {
        Some(path) if config.conversation_tracking.enabled => Some(TranscriptState {
            session_id: input.session_id.clone(),
            last_line_count: transcript::count_lines(Path::new(path)).unwrap_or_else(|err| {
                debug!("counting transcript lines: {err:#}");
                0
            }),
        }),
        _ => None,
    };

    LastSnapshot::from_scan(snapshot_id.as_str(), &scan.files, transcript)
        .save(&paths.last_snapshot_file())?;

    SessionData {
        pre_snapshot_id: snapshot_id.clone(),
        prompt: input.prompt.clone(),
        claude_session_id: input.session_id.clone(),
        started_at: non_empty(&input.timestamp)
            .map(String::from)
            .unwrap_or_else(now_rfc3339),
    }
    .save(&paths.session_file())?;

    Ok(Outcome::Recorded { snapshot_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn skip_pattern_is_case_insensitive() {
        let list = patterns(&["^/stats"]);
        assert_eq!(matching_skip_pattern(&list, "/STATS weekly"), Some("^/stats"));
        assert_eq!(matching_skip_pattern(&list, "show /stats"), None);
    }

    #[test]
    fn invalid_skip_patterns_are_ignored() {
        let list = patterns(&["(unclosed", "^help$"]);
        assert_eq!(matching_skip_pattern(&list, "(unclosed"), None);
        assert_eq!(matching_skip_pattern(&list, "HELP"), Some("^help$"));
    }

    #[test]
    fn empty_prompt_skips_before_reading_config() {
        let dir = tempfile::tempdir().unwrap();
        let input = UserPromptSubmitInput {
            prompt: "  \n ".into(),
            ..Default::default()
        };
        let outcome = run(&input, &Paths::new(dir.path())).unwrap();
        assert_eq!(outcome, Outcome::Skipped(Skip::EmptyPrompt));
    }

    #[test]
    fn missing_config_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let input = UserPromptSubmitInput {
            prompt: "hello".into(),
            ..Default::default()
        };
        let outcome = run(&input, &Paths::new(dir.path())).unwrap();
        assert_eq!(outcome, Outcome::Skipped(Skip::NotConfigured));
    }

    #[test]
    fn incomplete_credentials_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        std::fs::create_dir_all(paths.tracker_dir()).unwrap();
        std::fs::write(paths.config_file(), "{}").unwrap();
        std::fs::write(paths.credentials_file(), r#"{"api_key": "k"}"#).unwrap();
        let input = UserPromptSubmitInput {
            prompt: "hello".into(),
            ..Default::default()
        };
        assert!(run(&input, &paths).is_err());
    }
}
