use serde::Deserialize;

// ===================================================================
// Hook input types (received via stdin, snake_case JSON)
// ===================================================================
//
// The host sends more fields than these (cwd, hook_event_name,
// permission_mode, ...); they are ignored.

/// Input of the prompt-submit hook.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserPromptSubmitInput {
    pub prompt: String,
    pub session_id: String,
    /// RFC 3339; the hook's own clock is used when absent.
    pub timestamp: Option<String>,
    pub transcript_path: Option<String>,
}

/// Input of the stop hook. The host's `session_id` is not read: the turn's
/// session comes from the baton written by the prompt-submit hook.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StopInput {
    pub timestamp: Option<String>,
    pub transcript_path: Option<String>,
}

/// Treat empty strings like absent fields.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
