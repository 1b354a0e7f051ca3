//! Semantic attribute values produced by register decoding.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single decoded engineering value.
///
/// Serialises as plain JSON (`null`, `true`, `42`, `455.47`, `"OK"`, `[...]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Numeric view of `Int` and `Float` values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(text) => f.write_str(&text),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_float_as_number() {
        let json = serde_json::to_string(&AttributeValue::Float(455.47)).unwrap();
        assert_eq!(json, "455.47");
    }

    #[test]
    fn should_serialize_null_variant() {
        assert_eq!(serde_json::to_string(&AttributeValue::Null).unwrap(), "null");
    }

    #[test]
    fn should_deserialize_integer_as_int() {
        let val: AttributeValue = serde_json::from_str("3").unwrap();
        assert_eq!(val, AttributeValue::Int(3));
    }

    #[test]
    fn should_deserialize_fraction_as_float() {
        let val: AttributeValue = serde_json::from_str("3.5").unwrap();
        assert_eq!(val, AttributeValue::Float(3.5));
    }

    #[test]
    fn should_deserialize_nested_lists() {
        let val: AttributeValue = serde_json::from_str(r#"[true, "OFF", null]"#).unwrap();
        assert_eq!(
            val,
            AttributeValue::List(vec![
                AttributeValue::Bool(true),
                AttributeValue::Text("OFF".to_string()),
                AttributeValue::Null,
            ])
        );
    }

    #[test]
    fn should_expose_int_as_f64() {
        assert_eq!(AttributeValue::Int(48).as_f64(), Some(48.0));
        assert_eq!(AttributeValue::Text("x".into()).as_f64(), None);
    }

    #[test]
    fn should_display_as_json() {
        let val = AttributeValue::from(vec!["A", "B"]);
        assert_eq!(val.to_string(), r#"["A","B"]"#);
    }
}
