use crate::store::read_json_file;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_MAX_ENTRIES_PER_REQUEST: usize = 100;

/// Environment variable the host sets to the project being worked on.
pub const PROJECT_DIR_ENV: &str = "CLAUDE_PROJECT_DIR";

const TRACKER_DIR: &str = ".codetracker";

/// Settings for the automatic pre/post snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSnapshot {
    pub enabled: bool,
    /// Parsed for compatibility with existing config files.
    pub min_interval_seconds: u64,
    /// Case-insensitive regexes; a matching prompt is not snapshotted.
    pub skip_patterns: Vec<String>,
    /// Skip the post interaction when the turn changed nothing.
    pub only_on_changes: bool,
}

/// Settings for shipping transcript entries alongside interactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationTracking {
    pub enabled: bool,
    pub max_entries_per_request: usize,
}

impl Default for ConversationTracking {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries_per_request: DEFAULT_MAX_ENTRIES_PER_REQUEST,
        }
    }
}

/// Project settings stored in `.codetracker/config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub server_url: String,
    /// Gitignore-style patterns, see [`crate::ignore`].
    pub ignore_patterns: Vec<String>,
    /// Extensions including the leading `.`, e.g. `".rs"`.
    pub track_extensions: Vec<String>,
    /// Files larger than this many bytes are not tracked.
    pub max_file_size: u64,
    pub auto_snapshot: AutoSnapshot,
    pub conversation_tracking: ConversationTracking,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: String::new(),
            server_url: DEFAULT_SERVER_URL.into(),
            ignore_patterns: Vec::new(),
            track_extensions: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            auto_snapshot: AutoSnapshot::default(),
            conversation_tracking: ConversationTracking::default(),
        }
    }
}

impl Config {
    /// Load and normalize `config.json`, or `None` if the project has not
    /// been set up for tracking.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let config: Option<Config> = read_json_file(path)?;
        Ok(config.map(|mut config| {
            config.normalize();
            config
        }))
    }

    /// Zero values in the file mean "use the default".
    fn normalize(&mut self) {
        if self.server_url.is_empty() {
            self.server_url = DEFAULT_SERVER_URL.into();
        }
        if self.max_file_size == 0 {
            self.max_file_size = DEFAULT_MAX_FILE_SIZE;
        }
        if self.conversation_tracking.max_entries_per_request == 0 {
            self.conversation_tracking.max_entries_per_request = DEFAULT_MAX_ENTRIES_PER_REQUEST;
        }
    }
}

/// API credentials stored in `.codetracker/credentials.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub api_key: String,
    pub current_project_hash: String,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Both the key and the project hash are needed for every request.
    pub fn is_valid(&self) -> bool {
        !self.api_key.is_empty() && !self.current_project_hash.is_empty()
    }
}

/// On-disk locations, all derived from the project root.
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the project root from `CLAUDE_PROJECT_DIR`, falling back to
    /// the current working directory.
    pub fn discover() -> Result<Self> {
        match env::var_os(PROJECT_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Ok(Self::new(dir)),
            _ => {
                let cwd = env::current_dir().context("resolving current directory")?;
                Ok(Self::new(cwd))
            }
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.root
    }

    pub fn tracker_dir(&self) -> PathBuf {
        self.root.join(TRACKER_DIR)
    }

    pub fn config_file(&self) -> PathBuf {
        self.tracker_dir().join("config.json")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.tracker_dir().join("credentials.json")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.tracker_dir().join("cache")
    }

    pub fn last_snapshot_file(&self) -> PathBuf {
        self.cache_dir().join("last_snapshot.json")
    }

    pub fn session_file(&self) -> PathBuf {
        self.cache_dir().join("current_session.json")
    }
}
