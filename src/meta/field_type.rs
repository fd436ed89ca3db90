//! The closed set of mapping types a field may declare.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SundialError};

/// Type of a mapped field.
///
/// Raw type strings from index definitions are turned into this enum only
/// through [`FieldType::parse`], which folds case and rejects everything
/// outside the set, including near-misses such as `"string"` or `"int"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Keyword,
    Text,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    Date,
}

impl FieldType {
    /// Every field type, in declaration order.
    pub const ALL: [FieldType; 8] = [
        FieldType::Keyword,
        FieldType::Text,
        FieldType::Integer,
        FieldType::Long,
        FieldType::Float,
        FieldType::Double,
        FieldType::Boolean,
        FieldType::Date,
    ];

    /// Normalize a raw type string, case-insensitively.
    pub fn parse(raw: &str) -> Option<FieldType> {
        let folded = raw.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|field_type| field_type.as_str() == folded)
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Keyword => "keyword",
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
        }
    }

    /// Stable one-byte code used by the segment format.
    pub fn code(&self) -> u8 {
        Self::ALL
            .iter()
            .position(|field_type| field_type == self)
            .map_or(u8::MAX, |position| position as u8)
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Option<FieldType> {
        Self::ALL.get(code as usize).copied()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = SundialError;

    fn from_str(raw: &str) -> Result<Self> {
        FieldType::parse(raw)
            .ok_or_else(|| SundialError::schema(format!("unsupported field type '{raw}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(FieldType::parse("keyword"), Some(FieldType::Keyword));
        assert_eq!(FieldType::parse("INTEGER"), Some(FieldType::Integer));
        assert_eq!(FieldType::parse("FLOAT"), Some(FieldType::Float));
        assert_eq!(FieldType::parse("BOOLEAN"), Some(FieldType::Boolean));
        assert_eq!(FieldType::parse("dAtE"), Some(FieldType::Date));
    }

    #[test]
    fn test_parse_rejects_near_misses() {
        for raw in ["string", "int", "bool", "", " keyword", "keywords", "datetime"] {
            assert_eq!(FieldType::parse(raw), None, "{raw:?} should be rejected");
        }
        assert!("int".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_code_round_trip_covers_all() {
        for field_type in FieldType::ALL {
            assert_eq!(FieldType::from_code(field_type.code()), Some(field_type));
            assert_eq!(FieldType::parse(field_type.as_str()), Some(field_type));
        }
        assert_eq!(FieldType::from_code(8), None);
    }
}
