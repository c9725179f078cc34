//! Dotted path expressions.
//!
//! Segments are separated by `.`; a literal dot inside a key is written `\.`.
//! Array elements are addressed with a numeric segment (`servers.0`) or a
//! bracket suffix (`servers[0]`). The empty string addresses the root.

use crate::error::{ConfigError, ConfigResult};
use std::fmt;

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    /// The root path (no segments).
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path expression.
    pub fn parse(expression: &str) -> ConfigResult<Self> {
        let mut segments = Vec::new();
        if expression.is_empty() {
            return Ok(Self { segments });
        }

        let mut current = String::new();
        // Whether `current` is a complete segment that may be empty (after `]`).
        let mut closed = false;
        let mut chars = expression.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) => {
                        current.push(escaped);
                        closed = false;
                    }
                    None => return Err(ConfigError::path(expression, "dangling escape")),
                },
                '.' => {
                    if current.is_empty() && !closed {
                        return Err(ConfigError::path(expression, "empty segment"));
                    }
                    if !current.is_empty() {
                        segments.push(std::mem::take(&mut current));
                    }
                    closed = false;
                    if chars.peek().is_none() {
                        return Err(ConfigError::path(expression, "trailing dot"));
                    }
                }
                '[' => {
                    if !current.is_empty() {
                        segments.push(std::mem::take(&mut current));
                    } else if segments.is_empty() && !closed {
                        return Err(ConfigError::path(expression, "index without a key"));
                    }
                    let mut index = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) if d.is_ascii_digit() => index.push(d),
                            Some(other) => {
                                return Err(ConfigError::path(
                                    expression,
                                    format!("unexpected '{}' in index", other),
                                ));
                            }
                            None => return Err(ConfigError::path(expression, "unclosed '['")),
                        }
                    }
                    if index.is_empty() {
                        return Err(ConfigError::path(expression, "empty index"));
                    }
                    segments.push(index);
                    closed = true;
                }
                ']' => return Err(ConfigError::path(expression, "unmatched ']'")),
                other => {
                    if closed {
                        return Err(ConfigError::path(expression, "missing '.' after index"));
                    }
                    current.push(other);
                }
            }
        }

        if !current.is_empty() {
            segments.push(current);
        }
        Ok(Self { segments })
    }

    /// Path segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Split into the parent path and the last segment.
    pub fn split_last(&self) -> Option<(TreePath, &str)> {
        let (last, parent) = self.segments.split_last()?;
        Some((
            TreePath {
                segments: parent.to_vec(),
            },
            last.as_str(),
        ))
    }

    /// Append a segment.
    pub fn child(&self, segment: impl Into<String>) -> TreePath {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        TreePath { segments }
    }
}

impl From<Vec<String>> for TreePath {
    fn from(segments: Vec<String>) -> Self {
        Self { segments }
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&escape_segment(segment))?;
        }
        Ok(())
    }
}

/// Escape a raw key so it can be embedded in a path expression.
pub fn escape_segment(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        if matches!(c, '.' | '\\' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Join an already-rendered parent path and a raw child key.
pub fn join(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        escape_segment(segment)
    } else {
        format!("{}.{}", parent, escape_segment(segment))
    }
}
