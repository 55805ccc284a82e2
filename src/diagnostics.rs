use std::env;
use std::fs;
use std::path::PathBuf;

/// Where the last failure of `hook` is written.
pub fn error_log_path(hook: &str) -> PathBuf {
    env::temp_dir().join(format!("codetracker-{hook}-error.log"))
}

/// Leave the error chain of a failed run in the temp dir for later
/// inspection. Best effort: a failure to write is ignored.
pub fn record_error(hook: &str, err: &anyhow::Error) {
    let _ = fs::write(error_log_path(hook), format!("{err:#}\n"));
}
