//! Diagnostic suppressions for known-broken script content
//!
//! Entries are keyed by script name, the byte offset just past the
//! offending token, and the token itself. A match turns the diagnostic into
//! a debug line. At a block end an entry may also ask the dispatcher to
//! keep running instead of ending the event.
//!
//! ```toml
//! [[suppress]]
//! script = "goblin_base"
//! position = 2414
//! token = "set_npc_stat"
//!
//! [[suppress]]
//! script = "chest"
//! position = 810
//! token = "}"
//! resume = true
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ScriptError;

/// One suppressed diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suppression {
    pub script: String,
    pub position: usize,
    pub token: String,
    /// Block end only: continue past the closing brace
    #[serde(default)]
    pub resume: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SuppressionFile {
    #[serde(default)]
    suppress: Vec<Suppression>,
}

/// Lookup table of suppressions
#[derive(Debug, Clone, Default)]
pub struct SuppressionTable {
    entries: HashMap<(String, usize, String), bool>,
}

impl SuppressionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ScriptError> {
        let file: SuppressionFile = toml::from_str(content)?;
        let mut table = Self::new();
        for entry in file.suppress {
            table.insert(entry);
        }
        log::debug!(target: "ioscript", "loaded {} suppressions", table.len());
        Ok(table)
    }

    pub fn insert(&mut self, entry: Suppression) {
        self.entries
            .insert((entry.script, entry.position, entry.token), entry.resume);
    }

    /// Whether the diagnostic for `token` ending at `position` is silenced
    pub fn is_suppressed(&self, script: &str, position: usize, token: &str) -> bool {
        self.lookup(script, position, token).is_some()
    }

    /// Whether a closing brace at `position` should not end the event
    pub fn resumes_block(&self, script: &str, position: usize) -> bool {
        self.lookup(script, position, "}").unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, script: &str, position: usize, token: &str) -> Option<bool> {
        self.entries
            .get(&(script.to_string(), position, token.to_string()))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_toml() {
        let table = SuppressionTable::from_toml_str(
            r#"
[[suppress]]
script = "goblin"
position = 12
token = "foo"

[[suppress]]
script = "chest"
position = 40
token = "}"
resume = true
"#,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.is_suppressed("goblin", 12, "foo"));
        assert!(!table.is_suppressed("goblin", 13, "foo"));
        assert!(!table.resumes_block("goblin", 12));
        assert!(table.resumes_block("chest", 40));
    }

    #[test]
    fn test_empty_file() {
        let table = SuppressionTable::from_toml_str("").unwrap();
        assert!(table.is_empty());
    }
}
