//! Column type identifiers for Tabula.

use crate::error::{Result, TabulaError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Search key type shared by every index structure.
pub type Key = i32;

/// Width of an encoded DATE column ("YYYY-MM-DD").
pub const DATE_WIDTH: usize = 10;

/// Largest accepted VARCHAR width in bytes.
pub const MAX_VARCHAR_WIDTH: usize = 4096;

/// Column type identifiers.
///
/// Every type has a fixed on-disk width so that records have a constant size
/// for the lifetime of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// 32-bit signed integer.
    Int,
    /// 32-bit IEEE-754 float.
    Float,
    /// Zero-padded UTF-8 string of the given byte width.
    Varchar(u16),
    /// ASCII calendar date "YYYY-MM-DD".
    Date,
    /// Two packed 32-bit floats.
    FloatPair,
}

impl ColumnType {
    /// Returns the encoded width in bytes.
    pub fn fixed_size(&self) -> usize {
        match self {
            ColumnType::Int | ColumnType::Float => 4,
            ColumnType::Varchar(width) => *width as usize,
            ColumnType::Date => DATE_WIDTH,
            ColumnType::FloatPair => 8,
        }
    }

    /// Returns true if this type can serve as a search key.
    pub fn is_key_type(&self) -> bool {
        matches!(self, ColumnType::Int)
    }

    /// Parses a type name such as `INT`, `VARCHAR[20]` or `ARRAY[FLOAT;2]`.
    ///
    /// Matching is case-insensitive and ignores whitespace.
    pub fn parse(type_name: &str) -> Result<Self> {
        let normalized: String = type_name
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "INT" | "INTEGER" => return Ok(ColumnType::Int),
            "FLOAT" => return Ok(ColumnType::Float),
            "DATE" => return Ok(ColumnType::Date),
            "ARRAY[FLOAT]" | "ARRAY[FLOAT;2]" => return Ok(ColumnType::FloatPair),
            _ => {}
        }

        if let Some(rest) = normalized.strip_prefix("VARCHAR") {
            let width = rest
                .strip_prefix('[')
                .and_then(|r| r.strip_suffix(']'))
                .or_else(|| rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')))
                .ok_or_else(|| {
                    TabulaError::Schema(format!("malformed VARCHAR type: {}", type_name))
                })?;
            let width: usize = width.parse().map_err(|_| {
                TabulaError::Schema(format!("invalid VARCHAR width: {}", type_name))
            })?;
            return Self::varchar(width);
        }

        Err(TabulaError::Schema(format!(
            "unsupported column type: {}",
            type_name
        )))
    }

    /// Creates a VARCHAR type, validating the width.
    pub fn varchar(width: usize) -> Result<Self> {
        if width == 0 {
            return Err(TabulaError::Schema(
                "VARCHAR width must be positive".to_string(),
            ));
        }
        if width > MAX_VARCHAR_WIDTH {
            return Err(TabulaError::Schema(format!(
                "VARCHAR width {} exceeds maximum {}",
                width, MAX_VARCHAR_WIDTH
            )));
        }
        Ok(ColumnType::Varchar(width as u16))
    }
}

impl FromStr for ColumnType {
    type Err = TabulaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Int => write!(f, "INT"),
            ColumnType::Float => write!(f, "FLOAT"),
            ColumnType::Varchar(width) => write!(f, "VARCHAR[{}]", width),
            ColumnType::Date => write!(f, "DATE"),
            ColumnType::FloatPair => write!(f, "ARRAY[FLOAT;2]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_size() {
        assert_eq!(ColumnType::Int.fixed_size(), 4);
        assert_eq!(ColumnType::Float.fixed_size(), 4);
        assert_eq!(ColumnType::Varchar(20).fixed_size(), 20);
        assert_eq!(ColumnType::Date.fixed_size(), 10);
        assert_eq!(ColumnType::FloatPair.fixed_size(), 8);
    }

    #[test]
    fn test_parse_simple_types() {
        assert_eq!(ColumnType::parse("INT").unwrap(), ColumnType::Int);
        assert_eq!(ColumnType::parse("int").unwrap(), ColumnType::Int);
        assert_eq!(ColumnType::parse("Float").unwrap(), ColumnType::Float);
        assert_eq!(ColumnType::parse("date").unwrap(), ColumnType::Date);
    }

    #[test]
    fn test_parse_varchar() {
        assert_eq!(
            ColumnType::parse("VARCHAR[20]").unwrap(),
            ColumnType::Varchar(20)
        );
        assert_eq!(
            ColumnType::parse("varchar(10)").unwrap(),
            ColumnType::Varchar(10)
        );
        assert_eq!(
            ColumnType::parse(" VARCHAR [ 8 ] ").unwrap(),
            ColumnType::Varchar(8)
        );
    }

    #[test]
    fn test_parse_varchar_invalid_width() {
        assert!(matches!(
            ColumnType::parse("VARCHAR[0]"),
            Err(TabulaError::Schema(_))
        ));
        assert!(matches!(
            ColumnType::parse("VARCHAR[5000]"),
            Err(TabulaError::Schema(_))
        ));
        assert!(matches!(
            ColumnType::parse("VARCHAR[abc]"),
            Err(TabulaError::Schema(_))
        ));
        assert!(matches!(
            ColumnType::parse("VARCHAR"),
            Err(TabulaError::Schema(_))
        ));
    }

    #[test]
    fn test_parse_array() {
        assert_eq!(
            ColumnType::parse("ARRAY[FLOAT]").unwrap(),
            ColumnType::FloatPair
        );
        assert_eq!(
            ColumnType::parse("array[float; 2]").unwrap(),
            ColumnType::FloatPair
        );
        assert!(ColumnType::parse("ARRAY[FLOAT;3]").is_err());
    }

    #[test]
    fn test_parse_unknown() {
        let err = ColumnType::parse("GEOMETRY").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Schema error: unsupported column type: GEOMETRY"
        );
    }

    #[test]
    fn test_from_str() {
        let ty: ColumnType = "VARCHAR[12]".parse().unwrap();
        assert_eq!(ty, ColumnType::Varchar(12));
    }

    #[test]
    fn test_display_parses_back() {
        for ty in [
            ColumnType::Int,
            ColumnType::Float,
            ColumnType::Varchar(20),
            ColumnType::Date,
            ColumnType::FloatPair,
        ] {
            assert_eq!(ColumnType::parse(&ty.to_string()).unwrap(), ty);
        }
    }

    #[test]
    fn test_is_key_type() {
        assert!(ColumnType::Int.is_key_type());
        assert!(!ColumnType::Float.is_key_type());
        assert!(!ColumnType::Varchar(4).is_key_type());
    }

    #[test]
    fn test_serde_roundtrip() {
        let original = ColumnType::Varchar(32);
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: ColumnType = serde_json::from_str(&serialized).unwrap();
        assert_eq!(original, deserialized);
    }
}
