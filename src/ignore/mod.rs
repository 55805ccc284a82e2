//! Gitignore-style path filtering.
//!
//! Supported syntax is a practical subset of gitignore:
//!
//! - a trailing `/` makes a directory pattern, matching the path itself and
//!   everything below it;
//! - a leading `/` anchors the pattern to the project root;
//! - `**/` matches zero or more leading directories, a trailing `**` matches
//!   anything, and `**` elsewhere matches any run of characters including `/`;
//! - `*` matches any run of characters except `/`, `?` a single one;
//! - patterns without a `/` are tried against the basename and against every
//!   single path component, patterns with one against the whole path.
//!
//! Character classes are not supported: `[` is matched literally.

use log::debug;
use regex::Regex;

/// What a compiled pattern is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// `dir/`: the whole relative path, or any descendant of it.
    Directory,
    /// Contains a `/`: the whole relative path.
    Path,
    /// No `/`: the basename or any single path component.
    Name,
}

/// A single compiled ignore pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    scope: Scope,
}

impl Pattern {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let (body, is_dir) = match pattern.strip_suffix('/') {
            Some(body) => (body, true),
            None => (pattern, false),
        };
        let (body, rooted) = match body.strip_prefix('/') {
            Some(body) => (body, true),
            None => (body, false),
        };

        let scope = if is_dir {
            Scope::Directory
        } else if rooted || body.contains('/') {
            Scope::Path
        } else {
            Scope::Name
        };

        let translated = glob_to_regex(body);
        let regex = match scope {
            Scope::Directory => Regex::new(&format!("^{translated}(?:/.*)?$"))?,
            Scope::Path | Scope::Name => Regex::new(&format!("^{translated}$"))?,
        };

        Ok(Self { regex, scope })
    }

    pub fn matches(&self, relative_path: &str, basename: &str) -> bool {
        let path = relative_path.replace('\\', "/");
        match self.scope {
            Scope::Directory | Scope::Path => self.regex.is_match(&path),
            Scope::Name => {
                self.regex.is_match(basename)
                    || path.split('/').any(|component| self.regex.is_match(component))
            }
        }
    }
}

/// Translate glob syntax into an unanchored regex body.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2);
    let mut rest = glob;
    let mut buf = [0u8; 4];

    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix("**/") {
            out.push_str("(?:.*/)?");
            rest = after;
            continue;
        }
        if let Some(after) = rest.strip_prefix("**") {
            out.push_str(".*");
            rest = after;
            continue;
        }

        rest = &rest[c.len_utf8()..];
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }

    out
}

/// A set of ignore patterns plus the built-in dotfile rule.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    patterns: Vec<Pattern>,
}

impl Matcher {
    /// Compile every pattern. Empty and invalid patterns are skipped.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| !p.is_empty())
            .filter_map(|p| match Pattern::compile(p) {
                Ok(compiled) => Some(compiled),
                Err(err) => {
                    debug!("skipping ignore pattern {p:?}: {err}");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// True if any configured pattern matches.
    pub fn matches(&self, relative_path: &str, basename: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches(relative_path, basename))
    }

    /// Dotfiles and dot-directories are always ignored, whatever the
    /// configured patterns say.
    pub fn should_ignore(&self, relative_path: &str, basename: &str) -> bool {
        basename.starts_with('.') || self.matches(relative_path, basename)
    }
}
