//! `key=value;` connection string parsing.
//!
//! Keys are matched case-insensitively with whitespace removed, so
//! `Data Source`, `datasource` and `DATA SOURCE` name the same entry. Values
//! may be wrapped in single or double quotes to carry `;` or `=`.

use crate::core::{DbError, Result};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStringBuilder {
    entries: Vec<(String, String)>,
}

fn canonical_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl ConnectionStringBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a connection string. Empty segments are skipped.
    pub fn parse(connection_string: &str) -> Result<Self> {
        let mut builder = Self::new();
        for segment in split_segments(connection_string)? {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                DbError::invalid_argument(
                    "connection_string",
                    format!("segment '{}' is not a key=value pair", segment),
                )
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(DbError::invalid_argument(
                    "connection_string",
                    format!("segment '{}' has an empty key", segment),
                ));
            }
            builder.set(key, unquote(value.trim()));
        }
        Ok(builder)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let wanted = canonical_key(key);
        self.entries
            .iter()
            .find(|(k, _)| canonical_key(k) == wanted)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value of the first key in `keys` that is present.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// Sets `key`, replacing an existing entry with the same canonical key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let wanted = canonical_key(key);
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| canonical_key(k) == wanted) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let wanted = canonical_key(key);
        let before = self.entries.len();
        self.entries.retain(|(k, _)| canonical_key(k) != wanted);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses a boolean keyword value (`true/false`, `yes/no`, `1/0`).
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            _ => Err(DbError::invalid_argument(
                "connection_string",
                format!("'{}' is not a boolean value for '{}'", raw, key),
            )),
        }
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        raw.parse().map(Some).map_err(|_| {
            DbError::invalid_argument(
                "connection_string",
                format!("'{}' is not a number for '{}'", raw, key),
            )
        })
    }
}

fn split_segments(input: &str) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                current.push(c);
            }
            (None, ';') => segments.push(std::mem::take(&mut current)),
            (None, c) => current.push(c),
        }
    }

    if quote.is_some() {
        return Err(DbError::invalid_argument(
            "connection_string",
            "unterminated quoted value",
        ));
    }
    segments.push(current);
    Ok(segments)
}

fn unquote(value: &str) -> String {
    for q in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

impl fmt::Display for ConnectionStringBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            if value.contains(';') || value.contains('=') || value.contains('\'') {
                write!(f, "{}=\"{}\"", key, value)?;
            } else {
                write!(f, "{}={}", key, value)?;
            }
        }
        Ok(())
    }
}
