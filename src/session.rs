use crate::store::{read_json_file, remove_if_exists, write_json_file};
use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// State handed from the prompt-submit hook to the stop hook, stored as
/// `.codetracker/cache/current_session.json`.
///
/// The file exists exactly while a turn is open: it is written after the
/// pre snapshot was accepted by the server and removed once the stop hook
/// has dealt with the turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub pre_snapshot_id: String,
    pub prompt: String,
    pub claude_session_id: String,
    pub started_at: String,
}

impl SessionData {
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_file(path, self)
    }

    /// Any read or parse failure counts as "no open turn".
    pub fn load(path: &Path) -> Option<Self> {
        match read_json_file(path) {
            Ok(session) => session,
            Err(err) => {
                debug!("ignoring unreadable session file: {err:#}");
                None
            }
        }
    }

    /// Best-effort removal.
    pub fn delete(path: &Path) {
        if let Err(err) = remove_if_exists(path) {
            debug!("could not remove session file: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample() -> SessionData {
        SessionData {
            pre_snapshot_id: "s1".into(),
            prompt: "hello".into(),
            claude_session_id: "sess-1".into(),
            started_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn save_creates_directory_and_load_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("current_session.json");
        sample().save(&path).unwrap();
        assert_eq!(SessionData::load(&path), Some(sample()));
    }

    #[test]
    fn save_overwrites_previous_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current_session.json");
        sample().save(&path).unwrap();
        let next = SessionData {
            prompt: "again".into(),
            ..sample()
        };
        next.save(&path).unwrap();
        assert_eq!(SessionData::load(&path).unwrap().prompt, "again");
    }

    #[test]
    fn load_of_missing_or_corrupt_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current_session.json");
        assert!(SessionData::load(&path).is_none());
        fs::write(&path, "{\"prompt\": ").unwrap();
        assert!(SessionData::load(&path).is_none());
    }

    #[test]
    fn delete_removes_file_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current_session.json");
        sample().save(&path).unwrap();
        SessionData::delete(&path);
        assert!(!path.exists());
        SessionData::delete(&path);
    }
}
