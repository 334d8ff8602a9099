//! Value types shared by every compilation stage: typed constants and field
//! references.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// Declared type of a literal, kept even when the value itself is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Untyped `null`.
    Any,
    String,
    Integer,
    Float,
    Bool,
    DateTime,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Any => "any",
            ValueType::String => "string",
            ValueType::Integer => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::DateTime => "datetime",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "string" | "str" => Some(ValueType::String),
            "int" | "integer" | "long" | "i64" => Some(ValueType::Integer),
            "float" | "double" | "f64" => Some(ValueType::Float),
            "bool" | "boolean" => Some(ValueType::Bool),
            "datetime" | "date" => Some(ValueType::DateTime),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable, typed constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null(ValueType),
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
}

impl Literal {
    pub fn null() -> Self {
        Literal::Null(ValueType::Any)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null(_))
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::Null(ty) => *ty,
            Literal::String(_) => ValueType::String,
            Literal::Integer(_) => ValueType::Integer,
            Literal::Float(_) => ValueType::Float,
            Literal::Bool(_) => ValueType::Bool,
            Literal::DateTime(_) => ValueType::DateTime,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Integer(i64::from(value))
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(value: DateTime<Utc>) -> Self {
        Literal::DateTime(value)
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_else(Literal::null)
    }
}

// Rendered in the predicate text syntax so that descriptions parse back.
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null(_) => f.write_str("null"),
            Literal::String(s) => write!(f, "{s:?}"),
            Literal::Integer(n) => write!(f, "{n}"),
            Literal::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::DateTime(dt) => {
                write!(f, "@\"{}\"", dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }
}

/// Result of folding a closed expression: a single literal, or a literal
/// collection usable as the haystack of a membership test.
#[derive(Debug, Clone, PartialEq)]
pub enum Folded {
    Scalar(Literal),
    Collection(Vec<Literal>),
}

impl From<Literal> for Folded {
    fn from(value: Literal) -> Self {
        Folded::Scalar(value)
    }
}

impl fmt::Display for Folded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Folded::Scalar(lit) => write!(f, "{lit}"),
            Folded::Collection(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A reference to exactly one property of the record under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef(pub String);

impl FieldRef {
    pub fn new(name: impl Into<String>) -> Self {
        FieldRef(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_typed_null_keeps_declared_type() {
        let lit = Literal::Null(ValueType::Integer);
        assert!(lit.is_null());
        assert_eq!(lit.value_type(), ValueType::Integer);
        assert_eq!(Literal::from(None::<i64>).value_type(), ValueType::Any);
    }

    #[test]
    fn test_display_uses_predicate_syntax() {
        assert_eq!(Literal::from("a\"b").to_string(), r#""a\"b""#);
        assert_eq!(Literal::Float(2.0).to_string(), "2.0");
        assert_eq!(Literal::Float(2.5).to_string(), "2.5");
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(Literal::DateTime(dt).to_string(), r#"@"2024-01-02T03:04:05Z""#);
    }

    #[test]
    fn test_folded_collection_display() {
        let folded = Folded::Collection(vec![Literal::from("a"), Literal::null()]);
        assert_eq!(folded.to_string(), r#"["a", null]"#);
    }
}
