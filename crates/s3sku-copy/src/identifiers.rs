//! SKU identifier validation and extraction from the input table.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::input::InputTable;

pub const MAX_IDENTIFIER_LEN: usize = 100;
pub const DEFAULT_MAX_ITEMS: usize = 10_000;

static ALLOWED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._-]+$").expect("identifier pattern is valid")
});

/// A validated SKU: safe to use both as an S3 key segment and a directory name.
///
/// Deserializing goes through [`Identifier::parse`], so a tampered log line
/// cannot smuggle in an unsafe value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct Identifier(String);

/// Why a raw value was not accepted as an [`Identifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    TooLong(usize),
    PathTraversal,
    PathSeparator,
    DisallowedCharacter(char),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Empty => write!(f, "empty value"),
            Rejection::TooLong(len) => {
                write!(f, "{} chars exceeds limit of {}", len, MAX_IDENTIFIER_LEN)
            }
            Rejection::PathTraversal => write!(f, "contains a path traversal sequence"),
            Rejection::PathSeparator => write!(f, "contains a path separator"),
            Rejection::DisallowedCharacter(c) => write!(f, "disallowed character {:?}", c),
        }
    }
}

impl Identifier {
    /// Validate a raw cell value. Surrounding whitespace is trimmed first.
    pub fn parse(raw: &str) -> std::result::Result<Self, Rejection> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(Rejection::Empty);
        }
        let len = value.chars().count();
        if len > MAX_IDENTIFIER_LEN {
            return Err(Rejection::TooLong(len));
        }
        if value == "." || value.contains("..") {
            return Err(Rejection::PathTraversal);
        }
        if value.contains('/') || value.contains('\\') {
            return Err(Rejection::PathSeparator);
        }
        if !ALLOWED.is_match(value) {
            let bad = value
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
                .unwrap_or('?');
            return Err(Rejection::DisallowedCharacter(bad));
        }
        Ok(Identifier(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = Rejection;

    fn try_from(raw: String) -> std::result::Result<Self, Rejection> {
        Identifier::parse(&raw)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Result of [`extract_identifiers`]
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Sorted, deduplicated identifiers
    pub identifiers: Vec<Identifier>,
    /// Raw values that were dropped, with the reason
    pub rejected: Vec<(String, Rejection)>,
}

/// Pull the identifier set out of `column`.
///
/// Blank cells are ignored silently; invalid values are dropped and reported in
/// [`Extraction::rejected`]. Fails if the column is missing, nothing valid
/// remains, or more than `max_items` distinct identifiers are found.
pub fn extract_identifiers(
    table: &InputTable,
    column: &str,
    max_items: usize,
) -> Result<Extraction> {
    let mut unique = BTreeSet::new();
    let mut rejected = Vec::new();

    for value in table.column_values(column)?.flatten() {
        if value.trim().is_empty() {
            continue;
        }
        match Identifier::parse(value) {
            Ok(id) => {
                unique.insert(id);
            }
            Err(reason) => {
                warn!(value = %value, %reason, "rejecting identifier");
                rejected.push((value.to_string(), reason));
            }
        }
    }

    if unique.is_empty() {
        return Err(Error::EmptyInput);
    }
    if unique.len() > max_items {
        return Err(Error::TooManyItems {
            count: unique.len(),
            limit: max_items,
        });
    }

    debug!(count = unique.len(), rejected = rejected.len(), "extracted identifiers");
    Ok(Extraction {
        identifiers: unique.into_iter().collect(),
        rejected,
    })
}
