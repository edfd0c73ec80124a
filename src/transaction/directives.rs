//! Managed directive blocks
//!
//! A [`ManagedBlock`] is the content transform used by the hardening steps:
//! it removes every prior setting of the keys it owns (active or commented
//! out), removes any block a previous run wrote, and inserts a fresh block
//! between marker comments. Applying the same block twice yields the same
//! lines as applying it once.

use regex::Regex;
use thiserror::Error;

/// First line of every block this tool writes
pub const BLOCK_BEGIN: &str = "# BEGIN rampart managed block";
/// Last line of every block this tool writes
pub const BLOCK_END: &str = "# END rampart managed block";

/// A transform could not be applied without guessing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RewriteError(pub String);

/// Where the block goes in the rewritten file
#[derive(Debug, Clone)]
pub enum Placement {
    End,
    /// Before the first line matching the pattern, or at the end when none does.
    /// Used for `sshd_config`, where anything after a `Match` line is conditional.
    Before(Regex),
}

#[derive(Debug, Clone)]
pub struct ManagedBlock {
    keys: Vec<String>,
    lines: Vec<String>,
    placement: Placement,
}

impl Default for ManagedBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagedBlock {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            lines: Vec::new(),
            placement: Placement::End,
        }
    }

    /// `Key value` directive (sshd style); earlier settings of `key` are removed
    pub fn directive(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.keys.push(key.to_string());
        self.lines.push(format!("{key} {value}"));
        self
    }

    /// `key = value` assignment (sysctl / apt style); earlier settings of `key` are removed
    pub fn assignment(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.keys.push(key.to_string());
        self.lines.push(format!("{key} = {value}"));
        self
    }

    /// Line written verbatim with no key ownership
    pub fn raw_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Remove earlier settings of `key` without writing a replacement
    pub fn strip_key(mut self, key: &str) -> Self {
        self.keys.push(key.to_string());
        self
    }

    /// Insert the block before the first line matching `pattern`
    pub fn insert_before(mut self, pattern: &str) -> Result<Self, RewriteError> {
        let re = Regex::new(pattern)
            .map_err(|e| RewriteError(format!("invalid placement pattern: {e}")))?;
        self.placement = Placement::Before(re);
        Ok(self)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Produce the rewritten content. Nothing is returned unless every key
    /// and every line could be processed.
    pub fn apply(&self, input: &[String]) -> Result<Vec<String>, RewriteError> {
        self.check()?;
        let key_pattern = self.key_pattern()?;

        let mut kept: Vec<String> = Vec::with_capacity(input.len());
        let mut in_block = false;
        let mut skip_blank_after_block = false;

        for (idx, line) in input.iter().enumerate() {
            let trimmed = line.trim();

            if trimmed == BLOCK_BEGIN {
                if in_block {
                    return Err(RewriteError(format!(
                        "line {}: nested managed block",
                        idx + 1
                    )));
                }
                in_block = true;
                continue;
            }
            if trimmed == BLOCK_END {
                if !in_block {
                    return Err(RewriteError(format!(
                        "line {}: managed block end without a beginning",
                        idx + 1
                    )));
                }
                in_block = false;
                skip_blank_after_block = true;
                continue;
            }
            if in_block {
                continue;
            }
            if skip_blank_after_block {
                skip_blank_after_block = false;
                if trimmed.is_empty() {
                    continue;
                }
            }
            if key_pattern.as_ref().is_some_and(|re| re.is_match(line)) {
                continue;
            }
            kept.push(line.clone());
        }

        if in_block {
            return Err(RewriteError(
                "managed block is not terminated; refusing to guess its extent".to_string(),
            ));
        }

        let mut block = Vec::with_capacity(self.lines.len() + 2);
        block.push(BLOCK_BEGIN.to_string());
        block.extend(self.lines.iter().cloned());
        block.push(BLOCK_END.to_string());

        let anchor = match &self.placement {
            Placement::End => None,
            Placement::Before(re) => kept.iter().position(|line| re.is_match(line)),
        };

        match anchor {
            Some(idx) => {
                block.push(String::new());
                kept.splice(idx..idx, block);
            }
            None => {
                while kept.last().is_some_and(|l| l.trim().is_empty()) {
                    kept.pop();
                }
                if !kept.is_empty() {
                    kept.push(String::new());
                }
                kept.extend(block);
            }
        }

        Ok(kept)
    }

    fn check(&self) -> Result<(), RewriteError> {
        for key in &self.keys {
            if key.is_empty() {
                return Err(RewriteError("empty directive key".to_string()));
            }
            if key.chars().any(|c| c.is_whitespace() || c == '#' || c == '=') {
                return Err(RewriteError(format!("invalid directive key '{key}'")));
            }
        }
        for line in &self.lines {
            if line.contains('\n') || line.contains('\r') {
                return Err(RewriteError(format!(
                    "directive spans multiple lines: {line:?}"
                )));
            }
            let trimmed = line.trim();
            if trimmed == BLOCK_BEGIN || trimmed == BLOCK_END {
                return Err(RewriteError("directive collides with block marker".to_string()));
            }
        }
        Ok(())
    }

    /// Matches a key at line start, optionally commented out, followed by
    /// whitespace, `=` or end of line. Keys compare case-insensitively.
    fn key_pattern(&self) -> Result<Option<Regex>, RewriteError> {
        if self.keys.is_empty() {
            return Ok(None);
        }
        let alternatives = self
            .keys
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"(?i)^\s*#?\s*(?:{alternatives})(?:\s|=|$)");
        Regex::new(&pattern)
            .map(Some)
            .map_err(|e| RewriteError(format!("cannot build key pattern: {e}")))
    }
}
