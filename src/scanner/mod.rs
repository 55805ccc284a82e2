use crate::config::Config;
use crate::ignore::Matcher;
use log::debug;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// A tracked file as seen by one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative to the project root, `/`-separated.
    pub relative_path: String,
    /// Lower-case hex SHA-256 of the raw bytes.
    pub hash: String,
    /// File contents as text. Invalid UTF-8 is replaced, the hash is not
    /// affected.
    pub content: String,
    pub size: u64,
}

/// Scan output keyed by relative path.
pub type FileMap = BTreeMap<String, FileInfo>;

/// SHA-256 of `content` as lower-case hex.
pub fn hash_content(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Extension of a file name including the leading `.`, taken from the last
/// dot. `Makefile` has none; `archive.tar.gz` has `.gz`.
fn extension(name: &str) -> Option<&str> {
    name.rfind('.').map(|i| &name[i..])
}

/// Walks a project tree and fingerprints every tracked file.
pub struct Scanner {
    root: PathBuf,
    matcher: Matcher,
    track_extensions: HashSet<String>,
    max_file_size: u64,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            root: root.into(),
            matcher: Matcher::new(&config.ignore_patterns),
            track_extensions: config.track_extensions.iter().cloned().collect(),
            max_file_size: config.max_file_size,
        }
    }

    /// Walk the tree and return every tracked file.
    ///
    /// Ignored directories are pruned. Entries that can't be stat'ed or read
    /// are skipped; the scan itself never fails.
    pub fn scan(&self) -> FileMap {
        let mut files = FileMap::new();

        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_ignored(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("skipping unreadable entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(info) = self.fingerprint(&entry) {
                files.insert(info.relative_path.clone(), info);
            }
        }

        files
    }

    fn relative_path(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        Some(rel.to_string_lossy().replace('\\', "/"))
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        let Some(relative_path) = self.relative_path(entry.path()) else {
            return true;
        };
        let basename = entry.file_name().to_string_lossy();
        self.matcher.should_ignore(&relative_path, &basename)
    }

    fn is_tracked_extension(&self, name: &str) -> bool {
        extension(name).is_some_and(|ext| self.track_extensions.contains(ext))
    }

    /// Read and hash a file that passed the ignore filter, or `None` if it
    /// is untracked, too large, or unreadable.
    fn fingerprint(&self, entry: &DirEntry) -> Option<FileInfo> {
        let name = entry.file_name().to_string_lossy();
        if !self.is_tracked_extension(&name) {
            return None;
        }

        let len = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(err) => {
                debug!("skipping {}: {err}", entry.path().display());
                return None;
            }
        };
        if len > self.max_file_size {
            return None;
        }

        let bytes = match fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!("skipping {}: {err}", entry.path().display());
                return None;
            }
        };
        let relative_path = self.relative_path(entry.path())?;

        Some(FileInfo {
            relative_path,
            hash: hash_content(&bytes),
            size: bytes.len() as u64,
            content: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}
