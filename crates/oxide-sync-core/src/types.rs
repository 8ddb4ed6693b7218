//! Semantic column types.
//!
//! Entities declare what a property *means* (an integer, a bounded string,
//! a unique identifier); each dialect adapter decides how that is spelled
//! in its own catalog.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default precision used when a decimal property declares none.
pub const DEFAULT_DECIMAL_PRECISION: u8 = 18;

/// Default scale used when a decimal property declares none.
pub const DEFAULT_DECIMAL_SCALE: u8 = 2;

/// Semantic type of an entity property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    /// Unsigned 8-bit integer.
    Byte,
    /// True/false flag.
    Boolean,
    /// 16-bit integer.
    Short,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    Long,
    /// Exact decimal with precision and scale.
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// Single precision floating point.
    Float,
    /// Double precision floating point.
    Double,
    /// Date and time.
    DateTime,
    /// Time of day.
    Time,
    /// 128-bit unique identifier.
    Uid,
    /// Character data, optionally bounded.
    Text(Option<u32>),
    /// Binary large object.
    Blob,
    /// A type no dialect adapter knows how to store.
    Other(String),
}

impl SemanticType {
    /// Decimal with the default precision and scale.
    #[must_use]
    pub const fn decimal() -> Self {
        Self::Decimal {
            precision: DEFAULT_DECIMAL_PRECISION,
            scale: DEFAULT_DECIMAL_SCALE,
        }
    }

    /// Unbounded text.
    #[must_use]
    pub const fn text() -> Self {
        Self::Text(None)
    }

    /// Returns the declared maximum length, if this is bounded text.
    #[must_use]
    pub const fn max_length(&self) -> Option<u32> {
        match self {
            Self::Text(len) => *len,
            _ => None,
        }
    }

    /// Returns `true` for the integral types an identity column can use.
    #[must_use]
    pub const fn is_integral(&self) -> bool {
        matches!(self, Self::Byte | Self::Short | Self::Integer | Self::Long)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte => f.write_str("byte"),
            Self::Boolean => f.write_str("boolean"),
            Self::Short => f.write_str("short"),
            Self::Integer => f.write_str("integer"),
            Self::Long => f.write_str("long"),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision}, {scale})"),
            Self::Float => f.write_str("float"),
            Self::Double => f.write_str("double"),
            Self::DateTime => f.write_str("datetime"),
            Self::Time => f.write_str("time"),
            Self::Uid => f.write_str("uid"),
            Self::Text(Some(len)) => write!(f, "text({len})"),
            Self::Text(None) => f.write_str("text"),
            Self::Blob => f.write_str("blob"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(SemanticType::decimal().to_string(), "decimal(18, 2)");
        assert_eq!(SemanticType::Text(Some(40)).to_string(), "text(40)");
        assert_eq!(SemanticType::Other("geography".into()).to_string(), "geography");
    }

    #[test]
    fn test_serde_shape() {
        let parsed: Vec<SemanticType> =
            serde_json::from_str(r#"["integer", {"text": 80}, {"text": null}, {"other": "json"}]"#)
                .unwrap();
        assert_eq!(
            parsed,
            vec![
                SemanticType::Integer,
                SemanticType::Text(Some(80)),
                SemanticType::Text(None),
                SemanticType::Other("json".into()),
            ]
        );
    }

    #[test]
    fn test_max_length() {
        assert_eq!(SemanticType::Text(Some(12)).max_length(), Some(12));
        assert_eq!(SemanticType::Integer.max_length(), None);
        assert!(SemanticType::Long.is_integral());
        assert!(!SemanticType::Uid.is_integral());
    }
}
