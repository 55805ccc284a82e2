//! Incremental reading of the host's JSONL transcript.
//!
//! The transcript is append-only. Progress through it is tracked as a count
//! of non-empty lines (see [`crate::cache::TranscriptState`]); each stop hook
//! reads a bounded page of lines after that cursor and reduces the entries
//! to plain user/assistant text.

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Longest transcript line accepted. Reading stops at a longer one.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

// ===================================================================
// Entry shape
// ===================================================================

/// One line of the transcript. Only `type` and `message.content` are
/// modelled; everything else is ignored so unknown entry kinds still parse.
#[derive(Debug, Deserialize)]
pub struct TranscriptEntry {
    #[serde(rename = "type", default)]
    pub entry_type: String,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub content: Option<MessageContent>,
}

/// `message.content` is a plain string, an array of strings or content
/// blocks, or occasionally something else entirely.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text(String),
    Block(ContentBlock),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    /// `tool_use`, `tool_result`, `thinking`, ...
    #[serde(other)]
    Other,
}

/// Speaker of a conversation entry. The wire name is the transcript's
/// entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A transcript entry reduced to its visible text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationText {
    pub role: Role,
    pub content: String,
}

impl MessageContent {
    /// User text: a plain string, or the string elements of an array
    /// concatenated without separator.
    fn user_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect(),
            MessageContent::Other(_) => String::new(),
        }
    }

    /// Assistant text: the `text` blocks of an array, one per line.
    fn assistant_text(&self) -> String {
        match self {
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Block(ContentBlock::Text { text }) => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            MessageContent::Text(_) | MessageContent::Other(_) => String::new(),
        }
    }
}

impl TranscriptEntry {
    /// Reduce to `{role, content}`. Returns `None` for entries that are not
    /// user/assistant messages or carry no text after trimming.
    pub fn conversation_text(&self) -> Option<ConversationText> {
        let role = match self.entry_type.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => return None,
        };
        let content = self.message.as_ref()?.content.as_ref()?;
        let text = match role {
            Role::User => content.user_text(),
            Role::Assistant => content.assistant_text(),
        };
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(ConversationText {
            role,
            content: text.to_string(),
        })
    }
}

// ===================================================================
// Line reading
// ===================================================================

/// Iterator over the trimmed, non-empty lines of a reader.
///
/// Ends at EOF, on an I/O error, or at the first line longer than
/// [`MAX_LINE_BYTES`].
struct NonEmptyLines<R> {
    reader: R,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> NonEmptyLines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for NonEmptyLines<R> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        while !self.done {
            self.buf.clear();
            let limit = MAX_LINE_BYTES as u64 + 1;
            match (&mut self.reader).take(limit).read_until(b'\n', &mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    let line = self.buf.strip_suffix(b"\n").unwrap_or(&self.buf);
                    if line.len() > MAX_LINE_BYTES {
                        debug!("transcript line exceeds {MAX_LINE_BYTES} bytes, stopping");
                        self.done = true;
                        continue;
                    }
                    let line = line.trim_ascii();
                    if !line.is_empty() {
                        return Some(line.to_vec());
                    }
                }
                Err(err) => {
                    debug!("transcript read error: {err}");
                    self.done = true;
                }
            }
        }
        None
    }
}

fn open_lines(path: &Path) -> Result<NonEmptyLines<BufReader<File>>> {
    let file =
        File::open(path).with_context(|| format!("opening transcript {}", path.display()))?;
    Ok(NonEmptyLines::new(BufReader::new(file)))
}

/// Count the non-empty lines of the transcript.
pub fn count_lines(path: &Path) -> Result<usize> {
    Ok(open_lines(path)?.count())
}

/// A bounded slice of transcript lines.
#[derive(Debug, Default)]
pub struct Page {
    /// Entries that parsed, in file order.
    pub entries: Vec<TranscriptEntry>,
    /// Non-empty lines consumed, including ones that failed to parse.
    pub lines_read: usize,
}

impl Page {
    /// Filtered user/assistant text of the page.
    pub fn conversation(&self) -> Vec<ConversationText> {
        self.entries
            .iter()
            .filter_map(TranscriptEntry::conversation_text)
            .collect()
    }
}

/// Read up to `max_lines` non-empty lines after skipping `start_line` of
/// them.
pub fn read_page(path: &Path, start_line: usize, max_lines: usize) -> Result<Page> {
    let mut page = Page::default();
    for (offset, line) in open_lines(path)?.skip(start_line).take(max_lines).enumerate() {
        page.lines_read += 1;
        match serde_json::from_slice::<TranscriptEntry>(&line) {
            Ok(entry) => page.entries.push(entry),
            Err(err) => debug!("transcript line {} unparseable: {err}", start_line + offset + 1),
        }
    }
    Ok(page)
}
