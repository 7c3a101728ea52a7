//! Script source store
//!
//! Holds the immutable text of one script together with the jump caches
//! computed when it loads: the offset of every fixed `on <event>` block,
//! the offset following every `>>label`, and a newline index for
//! line/column lookups.

use std::collections::HashMap;
use std::path::Path;

use crate::event::{EventName, ScriptMessage};
use crate::ScriptError;

/// Immutable script text plus its side tables
#[derive(Debug, Clone)]
pub struct ScriptSource {
    name: String,
    text: String,
    valid: bool,
    events: [Option<usize>; ScriptMessage::COUNT],
    labels: HashMap<String, usize>,
    newlines: Vec<usize>,
}

impl ScriptSource {
    /// Build a source from already normalized text
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let name = name.into();
        let text = text.into();
        let valid = !text.is_empty();

        let mut events = [None; ScriptMessage::COUNT];
        for (slot, message) in ScriptMessage::NAMED.iter().enumerate() {
            if let Some(name) = message.name() {
                events[slot] = find_header(&text, &format!("on {}", name));
            }
        }

        let labels = scan_labels(&text);
        let newlines = text
            .bytes()
            .enumerate()
            .filter(|(_, b)| *b == b'\n')
            .map(|(i, _)| i)
            .collect();

        log::trace!(
            target: "ioscript",
            "loaded script {} ({} bytes, {} labels)",
            name,
            text.len(),
            labels.len()
        );

        Self {
            name,
            text,
            valid,
            events,
            labels,
            newlines,
        }
    }

    /// Build a source from raw script file content
    pub fn from_raw(name: impl Into<String>, raw: &str) -> Self {
        Self::new(name, normalize(raw))
    }

    /// Read and normalize a script file; the file stem names the script
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_raw(name, &raw))
    }

    /// A script with no text
    pub fn empty() -> Self {
        Self::new("", "")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Offset just after the `on <event>` header
    ///
    /// Fixed events come from the load-time cache; named events are found
    /// with a linear search every time.
    pub fn find_event(&self, event: &EventName) -> Option<usize> {
        match event {
            EventName::Message(message) => message.slot().and_then(|slot| self.events[slot]),
            EventName::Named(name) => find_header(&self.text, &format!("on {}", name)),
        }
    }

    /// Offset just after the first `>>label` occurrence
    pub fn label(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    pub fn labels(&self) -> impl Iterator<Item = (&str, usize)> {
        self.labels.iter().map(|(name, pos)| (name.as_str(), *pos))
    }

    /// Number of `{` blocks open at `pos`
    ///
    /// Braces inside quotes and `//` comments do not count.
    pub fn block_depth(&self, pos: usize) -> usize {
        let bytes = self.text.as_bytes();
        let end = pos.min(bytes.len());
        let mut depth = 0usize;
        let mut i = 0;
        while i < end {
            match bytes[i] {
                b'"' => {
                    i += 1;
                    while i < end && bytes[i] != b'"' && bytes[i] != b'\n' {
                        i += 1;
                    }
                }
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    while i < end && bytes[i] != b'\n' {
                        i += 1;
                    }
                    continue;
                }
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                _ => {}
            }
            i += 1;
        }
        depth
    }

    /// 1-based line and column of a byte offset
    pub fn line_column(&self, pos: usize) -> (usize, usize) {
        let pos = pos.min(self.text.len());
        let line = self.newlines.partition_point(|&n| n < pos);
        let line_start = if line == 0 { 0 } else { self.newlines[line - 1] + 1 };
        (line + 1, pos - line_start + 1)
    }
}

impl Default for ScriptSource {
    fn default() -> Self {
        Self::empty()
    }
}

/// Lowercase, unify newlines and blank out `/* ... */` comments
///
/// Block comments are replaced with spaces so offsets and line numbers of
/// the remaining text stay put.
pub fn normalize(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n").to_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_block = false;
    let mut in_line = false;

    while let Some(c) = chars.next() {
        if in_block {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                out.push_str("  ");
                in_block = false;
            } else if c == '\n' {
                out.push('\n');
            } else {
                for _ in 0..c.len_utf8() {
                    out.push(' ');
                }
            }
            continue;
        }
        match c {
            '\n' => {
                in_line = false;
                out.push(c);
            }
            '/' if !in_line && chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str("  ");
                in_block = true;
            }
            '/' if chars.peek() == Some(&'/') => {
                in_line = true;
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Whether `pos` lies after a `//` on its line
pub(crate) fn is_commented(text: &str, pos: usize) -> bool {
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    text[line_start..pos].contains("//")
}

/// Find a header such as `on init` as a whole word outside comments
fn find_header(text: &str, header: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(found) = text[from..].find(header) {
        let start = from + found;
        let end = start + header.len();
        from = start + 1;

        let before_ok = start == 0 || bytes[start - 1] <= b' ';
        let after_ok = end >= bytes.len() || bytes[end] <= b' ';
        if before_ok && after_ok && !is_commented(text, start) {
            return Some(end);
        }
    }
    None
}

/// Record the first uncommented occurrence of every `>>label`
fn scan_labels(text: &str) -> HashMap<String, usize> {
    let bytes = text.as_bytes();
    let mut labels = HashMap::new();
    let mut from = 0;
    while let Some(found) = text[from..].find(">>") {
        let start = from + found;
        let name_start = start + 2;
        let mut end = name_start;
        while end < bytes.len() && bytes[end] > b' ' {
            end += 1;
        }
        from = end.max(start + 2);

        if end == name_start || is_commented(text, start) {
            continue;
        }
        if start > 0 && bytes[start - 1] > b' ' {
            continue;
        }
        labels.entry(text[name_start..end].to_string()).or_insert(end);
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_offsets() {
        let src = ScriptSource::new("t", "on init {\n accept\n}\non hit {\n refuse\n}\n");
        let init = src.find_event(&ScriptMessage::Init.into()).unwrap();
        assert_eq!(&src.text()[init..init + 2], " {");
        assert!(src.find_event(&ScriptMessage::Hit.into()).is_some());
        assert!(src.find_event(&ScriptMessage::Die.into()).is_none());
    }

    #[test]
    fn test_header_needs_word_boundary() {
        let src = ScriptSource::new("t", "on initend {\n accept\n}\n");
        assert!(src.find_event(&ScriptMessage::Init.into()).is_none());
        assert!(src.find_event(&ScriptMessage::InitEnd.into()).is_some());
    }

    #[test]
    fn test_commented_header_is_ignored() {
        let src = ScriptSource::new("t", "// on init {\non init {\n accept\n}\n");
        let pos = src.find_event(&ScriptMessage::Init.into()).unwrap();
        assert_eq!(src.line_column(pos).0, 2);
    }

    #[test]
    fn test_named_event_search() {
        let src = ScriptSource::new("t", "on mytag {\n accept\n}\n");
        assert!(src.find_event(&EventName::parse("mytag")).is_some());
        assert!(src.find_event(&EventName::parse("other")).is_none());
    }

    #[test]
    fn test_labels_first_match_wins() {
        let text = ">>a\n set #x 1\n>>a\n set #x 2\n// >>b\n";
        let src = ScriptSource::new("t", text);
        assert_eq!(src.label("a"), Some(3));
        assert_eq!(src.label("b"), None);
    }

    #[test]
    fn test_block_depth() {
        let text = "on init {\n if (1 == 1) {\n set $s \"{\" // {\n }\n>>a\n}\n>>b\n";
        let src = ScriptSource::new("t", text);
        assert_eq!(src.block_depth(0), 0);
        assert_eq!(src.block_depth(text.find("if").unwrap()), 1);
        assert_eq!(src.block_depth(text.find("set").unwrap()), 2);
        assert_eq!(src.block_depth(src.label("a").unwrap()), 1);
        assert_eq!(src.block_depth(src.label("b").unwrap()), 0);
    }

    #[test]
    fn test_line_column() {
        let src = ScriptSource::new("t", "ab\ncd\n");
        assert_eq!(src.line_column(0), (1, 1));
        assert_eq!(src.line_column(1), (1, 2));
        assert_eq!(src.line_column(3), (2, 1));
        assert_eq!(src.line_column(4), (2, 2));
    }

    #[test]
    fn test_validity() {
        assert!(!ScriptSource::empty().is_valid());
        assert!(ScriptSource::new("t", "x").is_valid());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("ON Init\r\n"), "on init\n");
        let out = normalize("a /* b\nc */ d");
        assert_eq!(out, format!("a{}\n{}d", " ".repeat(5), " ".repeat(5)));
        assert_eq!(normalize("x // /* y\nz"), "x // /* y\nz");
    }
}
