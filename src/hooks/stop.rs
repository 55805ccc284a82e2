use super::{Outcome, ScanState, Settings, Skip, now_rfc3339};
use crate::api::{
    Client, ConversationEntry, CreateInteractionRequest, SendConversationsRequest,
    SendConversationsResponse,
};
use crate::cache::{LastSnapshot, TranscriptState};
use crate::config::Paths;
use crate::session::SessionData;
use crate::transcript::{self, Page};
use crate::types::{StopInput, non_empty};
use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::Path;

/// Result of pushing the turn's new transcript entries.
struct ConversationUpload {
    /// Stored id range, if anything was sent and accepted.
    range: Option<SendConversationsResponse>,
    /// Cursor to persist for the next turn.
    cursor: TranscriptState,
}

/// Send the transcript lines written since the last recorded cursor.
///
/// Failures here never abort the turn: an unreadable transcript counts as
/// no new lines and a failed upload just leaves the interaction without
/// conversation ids. The cursor advances by the lines read either way.
fn upload_conversation(
    client: &Client,
    project_hash: &str,
    session_id: &str,
    transcript_path: &Path,
    max_entries: usize,
    previous: Option<&TranscriptState>,
) -> ConversationUpload {
    let start_line = TranscriptState::resume_line(previous, session_id);
    let page = transcript::read_page(transcript_path, start_line, max_entries)
        .unwrap_or_else(|err| {
            debug!("reading transcript: {err:#}");
            Page::default()
        });

    let entries: Vec<ConversationEntry> = page
        .conversation()
        .into_iter()
        .map(ConversationEntry::from)
        .collect();
    debug!(
        "transcript lines {}..{}: {} conversation entries",
        start_line,
        start_line + page.lines_read,
        entries.len()
    );

    let range = if entries.is_empty() {
        None
    } else {
        let request = SendConversationsRequest {
            project_hash,
            session_id,
            entries,
        };
        match client.send_conversations(&request) {
            Ok(range) => Some(range),
            Err(err) => {
                warn!("sending conversation entries: {err}");
                None
            }
        }
    };

    ConversationUpload {
        range,
        cursor: TranscriptState {
            session_id: session_id.to_string(),
            last_line_count: start_line + page.lines_read,
        },
    }
}

/// Stop phase: record what the turn changed and close it.
pub fn run(input: &StopInput, paths: &Paths) -> Result<Outcome> {
    let session_file = paths.session_file();
    let Some(session) = SessionData::load(&session_file) else {
        return Ok(Outcome::Skipped(Skip::NoOpenTurn));
    };

    let Some(Settings {
        config,
        credentials,
    }) = Settings::load(paths)?
    else {
        return Ok(Outcome::Skipped(Skip::NotConfigured));
    };

    let scan = ScanState::collect(paths, &config);

    if scan.changes.is_empty() && config.auto_snapshot.only_on_changes {
        SessionData::delete(&session_file);
        return Ok(Outcome::Skipped(Skip::NoChanges));
    }

    let client = Client::new(&config.server_url, &credentials.api_key)?;

    let conversation = match non_empty(&input.transcript_path) {
        Some(path) if config.conversation_tracking.enabled => Some(upload_conversation(
            &client,
            &credentials.current_project_hash,
            &session.claude_session_id,
            Path::new(path),
            config.conversation_tracking.max_entries_per_request,
            scan.last.as_ref().and_then(|last| last.transcript.as_ref()),
        )),
        _ => None,
    };
    let range = conversation.as_ref().and_then(|c| c.range);

    let ended_at = non_empty(&input.timestamp)
        .map(String::from)
        .unwrap_or_else(now_rfc3339);
    let request = CreateInteractionRequest {
        project_hash: &credentials.current_project_hash,
        message: format!("[AUTO-POST] {}", session.prompt),
        changes: &scan.changes,
        parent_snapshot_id: &session.pre_snapshot_id,
        claude_session_id: &session.claude_session_id,
        started_at: &session.started_at,
        ended_at: &ended_at,
        conversation_start_id: range.map(|r| r.start_id),
        conversation_end_id: range.map(|r| r.end_id),
    };
    let response = client
        .create_interaction(&request)
        .context("posting interaction")?;

    let snapshot_id = if response.snapshot_id.is_empty() {
        session.pre_snapshot_id.clone()
    } else {
        response.snapshot_id.into_string()
    };

    // The interaction is on the server now, so the turn is closed even if
    // the cache can't be written.
    let saved = LastSnapshot::from_scan(
        snapshot_id.as_str(),
        &scan.files,
        conversation.map(|c| c.cursor),
    )
    .save(&paths.last_snapshot_file());
    SessionData::delete(&session_file);
    saved?;

    Ok(Outcome::Recorded { snapshot_id })
}
