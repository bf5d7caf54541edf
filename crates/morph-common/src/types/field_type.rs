//! Logical field types.
//!
//! The only type vocabulary clients see. Each field type is written on
//! the wire and in the catalog as a short token: `STR`, `NUM` or `BOOL`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical type of a dynamic table field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldType {
    /// Bounded text.
    #[serde(rename = "STR")]
    String,
    /// Signed integer.
    #[serde(rename = "NUM")]
    Number,
    /// True / false.
    #[serde(rename = "BOOL")]
    Boolean,
}

impl FieldType {
    /// All field types, in declaration order.
    pub const ALL: [FieldType; 3] = [FieldType::String, FieldType::Number, FieldType::Boolean];

    /// Returns the wire/catalog token for this type.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            FieldType::String => "STR",
            FieldType::Number => "NUM",
            FieldType::Boolean => "BOOL",
        }
    }

    /// Returns the human readable label for this type.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Number => "Number",
            FieldType::Boolean => "Boolean",
        }
    }

    /// Parses a wire/catalog token. Tokens are case-sensitive.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.token() == token)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
