use crate::scanner::{FileInfo, FileMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cached fingerprint of a file from a previous snapshot. Content is never
/// stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFileInfo {
    pub hash: String,
    pub size: u64,
}

impl From<&FileInfo> for SnapshotFileInfo {
    fn from(info: &FileInfo) -> Self {
        Self {
            hash: info.hash.clone(),
            size: info.size,
        }
    }
}

/// Fingerprints keyed by relative path.
pub type SnapshotFiles = BTreeMap<String, SnapshotFileInfo>;

/// Reduce a scan to the fingerprints worth caching.
pub fn fingerprints(files: &FileMap) -> SnapshotFiles {
    files
        .iter()
        .map(|(path, info)| (path.clone(), SnapshotFileInfo::from(info)))
        .collect()
}

/// A per-path delta, serialized in the wire shape
/// `{"file_path", "type": "A"|"M"|"D", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Change {
    #[serde(rename = "A")]
    Added {
        file_path: String,
        hash: String,
        content: String,
        size: u64,
    },
    #[serde(rename = "M")]
    Modified {
        file_path: String,
        hash: String,
        content: String,
        size: u64,
        previous_hash: String,
    },
    #[serde(rename = "D")]
    Deleted {
        file_path: String,
        previous_hash: String,
    },
}

impl Change {
    pub fn file_path(&self) -> &str {
        match self {
            Self::Added { file_path, .. }
            | Self::Modified { file_path, .. }
            | Self::Deleted { file_path, .. } => file_path,
        }
    }

    fn added(info: &FileInfo) -> Self {
        Self::Added {
            file_path: info.relative_path.clone(),
            hash: info.hash.clone(),
            content: info.content.clone(),
            size: info.size,
        }
    }
}

/// Compare the current scan against the previous snapshot's fingerprints.
///
/// With no previous snapshot every file is added. Otherwise a path is
/// modified only if its hash differs; size is not consulted. The result is
/// ordered by path.
pub fn calculate_changes(current: &FileMap, previous: Option<&SnapshotFiles>) -> Vec<Change> {
    let Some(previous) = previous else {
        return current.values().map(Change::added).collect();
    };

    let mut changes: Vec<Change> = current
        .values()
        .filter_map(|info| match previous.get(&info.relative_path) {
            None => Some(Change::added(info)),
            Some(prev) if prev.hash != info.hash => Some(Change::Modified {
                file_path: info.relative_path.clone(),
                hash: info.hash.clone(),
                content: info.content.clone(),
                size: info.size,
                previous_hash: prev.hash.clone(),
            }),
            Some(_) => None,
        })
        .collect();

    changes.extend(
        previous
            .iter()
            .filter(|(path, _)| !current.contains_key(path.as_str()))
            .map(|(path, prev)| Change::Deleted {
                file_path: path.clone(),
                previous_hash: prev.hash.clone(),
            }),
    );

    changes.sort_by(|a, b| a.file_path().cmp(b.file_path()));
    changes
}
