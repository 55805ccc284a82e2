use crate::diff::{SnapshotFiles, fingerprints};
use crate::scanner::FileMap;
use crate::store::{read_json_file, write_json_file};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Cursor into the host's JSONL transcript: how many non-empty lines have
/// already been shipped for `session_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptState {
    pub session_id: String,
    pub last_line_count: usize,
}

impl TranscriptState {
    /// Line to resume from for `session_id`: the stored count if the session
    /// matches, otherwise the start of the file.
    pub fn resume_line(state: Option<&Self>, session_id: &str) -> usize {
        state
            .filter(|s| s.session_id == session_id)
            .map_or(0, |s| s.last_line_count)
    }
}

/// Fingerprints of the last snapshot posted to the server, stored as
/// `.codetracker/cache/last_snapshot.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSnapshot {
    #[serde(default)]
    pub snapshot_id: String,
    pub files: SnapshotFiles,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<TranscriptState>,
}

/// Accepts the current document and the older layout, which was just the
/// `files` map at top level.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSnapshot {
    Current(LastSnapshot),
    Legacy(SnapshotFiles),
}

impl LastSnapshot {
    /// Build the cache entry for a scan. Content is dropped, only
    /// fingerprints are kept.
    pub fn from_scan(
        snapshot_id: impl Into<String>,
        files: &FileMap,
        transcript: Option<TranscriptState>,
    ) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            files: fingerprints(files),
            transcript,
        }
    }

    /// Load the cache, or `None` if it hasn't been written yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let stored: Option<StoredSnapshot> = read_json_file(path)?;
        Ok(stored.map(|stored| match stored {
            StoredSnapshot::Current(snapshot) => snapshot,
            StoredSnapshot::Legacy(files) => Self {
                files,
                ..Self::default()
            },
        }))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_file(path, self)
    }

    /// Previous snapshot id, if one was recorded.
    pub fn parent_id(&self) -> Option<&str> {
        Some(self.snapshot_id.as_str()).filter(|id| !id.is_empty())
    }
}
