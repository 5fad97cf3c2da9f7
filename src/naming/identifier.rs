//! Database identifiers and attribute paths.
//!
//! An [`Identifier`] is a name plus a quoting flag. Quoting is carried as data
//! instead of being baked into the text, so that naming strategies can
//! transform the text without losing (or accidentally adding) delimiters.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Marker path segment inserted for the element of an element collection.
///
/// Implicit naming strategies strip it when deriving column names, so that
/// `addresses.collection&&element.city` becomes `addresses_city`.
pub const COLLECTION_ELEMENT_MARKER: &str = "collection&&element";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    text: String,
    quoted: bool,
}

impl Identifier {
    pub fn new(text: impl Into<String>, quoted: bool) -> Self {
        Identifier {
            text: text.into(),
            quoted,
        }
    }

    /// Parse a raw name, recognising backtick or double-quote delimiters.
    ///
    /// Returns `None` for blank input.
    pub fn to_identifier(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if is_quoted(trimmed) {
            let inner = &trimmed[1..trimmed.len() - 1];
            return Some(Identifier::new(inner, true));
        }
        Some(Identifier::new(trimmed, false))
    }

    /// Parse a raw name that is known to be non-blank.
    pub fn parse(raw: &str) -> Self {
        Self::to_identifier(raw).unwrap_or_else(|| Identifier::new(raw, false))
    }

    pub fn quoted(self) -> Self {
        Identifier {
            text: self.text,
            quoted: true,
        }
    }

    /// Force quoting when `condition` holds.
    pub fn quoted_if(self, condition: bool) -> Self {
        if condition {
            self.quoted()
        } else {
            self
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// Name used for case-insensitive lookups of unquoted identifiers.
    pub fn canonical_name(&self) -> String {
        if self.quoted {
            self.text.clone()
        } else {
            self.text.to_lowercase()
        }
    }

    /// Rendered form with backtick delimiters when quoted.
    pub fn render(&self) -> String {
        if self.quoted {
            format!("`{}`", self.text)
        } else {
            self.text.clone()
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// True when `raw` is wrapped in backticks or double quotes.
pub fn is_quoted(raw: &str) -> bool {
    raw.len() >= 2
        && ((raw.starts_with('`') && raw.ends_with('`'))
            || (raw.starts_with('"') && raw.ends_with('"')))
}

/// Quoting rules of the target database environment.
#[derive(Debug, Clone, Default)]
pub struct NamingEnvironment {
    pub globally_quoted: bool,
    keywords: HashSet<String>,
}

impl NamingEnvironment {
    pub fn new(globally_quoted: bool, keywords: &[String]) -> Self {
        NamingEnvironment {
            globally_quoted,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Apply global quoting and keyword auto-quoting.
    pub fn normalize(&self, identifier: Identifier) -> Identifier {
        if identifier.is_quoted() {
            return identifier;
        }
        let is_keyword = self.keywords.contains(&identifier.text().to_lowercase());
        identifier.quoted_if(self.globally_quoted || is_keyword)
    }
}

///
/// AttributePath
/// Dotted property path from the owning entity down to an attribute.
///

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AttributePath {
    parts: Vec<String>,
}

impl AttributePath {
    pub fn parse(path: &str) -> Self {
        AttributePath {
            parts: path
                .split('.')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn append(&self, property: &str) -> Self {
        let mut parts = self.parts.clone();
        parts.push(property.to_string());
        AttributePath { parts }
    }

    /// Last segment (the attribute's own name).
    pub fn property(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    pub fn full_path(&self) -> String {
        self.parts.join(".")
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn is_collection_element(&self) -> bool {
        self.parts.iter().any(|p| p == COLLECTION_ELEMENT_MARKER)
    }

    /// Parts with the collection element marker removed.
    pub fn naming_parts(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter(|p| p.as_str() != COLLECTION_ELEMENT_MARKER)
            .map(String::as_str)
            .collect()
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path())
    }
}
