//! The two hook drivers and what they share.
//!
//! A turn is recorded in two phases. [`user_prompt_submit::run`] posts a
//! pre snapshot and leaves a session baton on disk; [`stop::run`] picks the
//! baton up, posts the interaction that closes the turn and removes it.
//! The on-disk cache and baton are the only state shared between the two
//! processes.

pub mod stop;
pub mod user_prompt_submit;

use crate::cache::LastSnapshot;
use crate::config::{Config, Credentials, Paths};
use crate::diagnostics;
use crate::diff::{Change, calculate_changes};
use crate::logging;
use crate::scanner::{FileMap, Scanner};
use anyhow::{Context, Result, bail};
use chrono::{SecondsFormat, Utc};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::fmt;
use std::io::{self, Read};
use std::panic::{self, AssertUnwindSafe};
use std::process;

/// How a driver run ended. Errors are reported separately through
/// `anyhow::Result`; every outcome, error or not, exits the process with 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Stopped early by input or policy; nothing was sent.
    Skipped(Skip),
    /// The server accepted the snapshot or interaction.
    Recorded { snapshot_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    EmptyPrompt,
    /// No `.codetracker/config.json` in the project.
    NotConfigured,
    AutoSnapshotDisabled,
    /// The prompt matched this configured skip pattern.
    SkipPattern(String),
    /// Stop hook found no session baton.
    NoOpenTurn,
    /// Nothing changed and `only_on_changes` is set.
    NoChanges,
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::EmptyPrompt => f.write_str("empty prompt"),
            Skip::NotConfigured => f.write_str("project not configured for tracking"),
            Skip::AutoSnapshotDisabled => f.write_str("auto snapshot disabled"),
            Skip::SkipPattern(p) => write!(f, "prompt matched skip pattern {p:?}"),
            Skip::NoOpenTurn => f.write_str("no open turn"),
            Skip::NoChanges => f.write_str("no changes"),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Skipped(skip) => write!(f, "skipped: {skip}"),
            Outcome::Recorded { snapshot_id } => write!(f, "recorded snapshot {snapshot_id}"),
        }
    }
}

/// Current UTC time as RFC 3339 with second precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Config and credentials, read once per run.
struct Settings {
    config: Config,
    credentials: Credentials,
}

impl Settings {
    /// `None` when the project has no config file.
    fn load(paths: &Paths) -> Result<Option<Self>> {
        let Some(config) = Config::load(&paths.config_file())? else {
            return Ok(None);
        };
        let credentials = Credentials::load(&paths.credentials_file())?;
        if !credentials.is_valid() {
            bail!("credentials are missing api_key or current_project_hash");
        }
        Ok(Some(Self {
            config,
            credentials,
        }))
    }
}

/// The current tree compared with the cached previous snapshot.
struct ScanState {
    files: FileMap,
    last: Option<LastSnapshot>,
    changes: Vec<Change>,
}

impl ScanState {
    fn collect(paths: &Paths, config: &Config) -> Self {
        let files = Scanner::new(paths.project_root(), config).scan();
        let last = match LastSnapshot::load(&paths.last_snapshot_file()) {
            Ok(last) => last,
            Err(err) => {
                warn!("ignoring unreadable snapshot cache: {err:#}");
                None
            }
        };
        let changes = calculate_changes(&files, last.as_ref().map(|l| &l.files));
        debug!("scanned {} files, {} changes", files.len(), changes.len());
        Self {
            files,
            last,
            changes,
        }
    }
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn read_input<I: DeserializeOwned>() -> Result<I> {
    let input = read_stdin().context("reading stdin")?;
    serde_json::from_str(&input).context("parsing hook input")
}

/// Run `work`, turning a panic into `None`. The panic itself is reported by
/// the hook from [`logging::install_panic_hook`].
fn contain<F>(work: F) -> Option<Result<Outcome>>
where
    F: FnOnce() -> Result<Outcome>,
{
    panic::catch_unwind(AssertUnwindSafe(work)).ok()
}

fn report(hook: &str, result: Option<Result<Outcome>>) {
    match result {
        Some(Ok(outcome)) => info!("{hook}: {outcome}"),
        Some(Err(err)) => {
            warn!("{hook}: {err:#}");
            diagnostics::record_error(hook, &err);
        }
        None => {}
    }
}

/// Entry point shared by the hook binaries.
///
/// Reads the hook payload from stdin, resolves the project and runs
/// `driver`. Whatever happens the process exits with status 0 and prints
/// nothing on stdout: tracking must never block the user's prompt. Failures
/// are logged and the last one is kept in [`diagnostics::error_log_path`].
pub fn execute<I, F>(hook: &'static str, driver: F) -> !
where
    I: DeserializeOwned,
    F: FnOnce(&I, &Paths) -> Result<Outcome>,
{
    logging::init();
    logging::install_panic_hook(hook);

    let result = contain(|| {
        let input: I = read_input()?;
        let paths = Paths::discover()?;
        debug!("{hook}: project root {}", paths.project_root().display());
        driver(&input, &paths)
    });
    report(hook, result);
    process::exit(0)
}
