//! Tagged value stored under a document key.

use super::Document;
use crate::error::{PrefsError, PrefsResult};
use serde_json::Number;

/// A preference value.
///
/// Arrays hold scalars of a single kind; see [`Value::is_supported`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Array(Vec<Value>),
    Object(Document),
}

/// Discriminant of a [`Value`], used for array homogeneity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Float,
    Bool,
    String,
    Array,
    Object,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Int => write!(f, "integer"),
            ValueKind::Float => write!(f, "float"),
            ValueKind::Bool => write!(f, "boolean"),
            ValueKind::String => write!(f, "string"),
            ValueKind::Array => write!(f, "array"),
            ValueKind::Object => write!(f, "object"),
        }
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Object(_))
    }

    /// Whether the value can be stored in a document.
    ///
    /// Floats must be finite (JSON has no NaN/inf). Arrays must contain
    /// scalars of one kind. Nested documents are checked recursively.
    pub fn is_supported(&self) -> bool {
        match self {
            Value::Float(f) => f.is_finite(),
            Value::Array(items) => {
                let Some(first) = items.first() else {
                    return true;
                };
                let kind = first.kind();
                items
                    .iter()
                    .all(|item| item.is_scalar() && item.kind() == kind && item.is_supported())
            }
            Value::Object(doc) => doc.iter().all(|(_, v)| v.is_supported()),
            _ => true,
        }
    }

    /// Text form of a scalar. Arrays and objects have none.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Object(doc) => Some(doc),
            _ => None,
        }
    }

    /// Convert a JSON value. `null` yields `Ok(None)` so callers can drop it.
    pub fn from_json(json: &serde_json::Value) -> PrefsResult<Option<Value>> {
        let value = match json {
            serde_json::Value::Null => return Ok(None),
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => number_to_value(n),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(array_from_json(items)?),
            serde_json::Value::Object(map) => Value::Object(Document::from_json_map(map)?),
        };
        Ok(Some(value))
    }

    /// Convert to JSON, optionally sorting object keys at every level.
    pub fn to_json(&self, sort: bool) -> serde_json::Value {
        match self {
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json(sort)).collect())
            }
            Value::Object(doc) => doc.to_json(sort),
        }
    }
}

fn number_to_value(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Int(i)
    } else {
        // u64 beyond i64::MAX and every non-integer land here
        Value::Float(n.as_f64().unwrap_or_default())
    }
}

fn array_from_json(items: &[serde_json::Value]) -> PrefsResult<Vec<Value>> {
    let mut values = Vec::with_capacity(items.len());
    for item in items {
        match Value::from_json(item)? {
            Some(value) if value.is_scalar() => values.push(value),
            Some(value) => {
                return Err(PrefsError::malformed(format!(
                    "arrays may only hold scalars, found {}",
                    value.kind()
                )));
            }
            None => return Err(PrefsError::malformed("arrays may not hold null")),
        }
    }

    let has_int = values.iter().any(|v| v.kind() == ValueKind::Int);
    let has_float = values.iter().any(|v| v.kind() == ValueKind::Float);
    if has_int && has_float {
        values = values
            .into_iter()
            .map(|v| match v {
                Value::Int(i) => Value::Float(i as f64),
                other => other,
            })
            .collect();
    }

    if let Some(first) = values.first() {
        let kind = first.kind();
        if let Some(other) = values.iter().find(|v| v.kind() != kind) {
            return Err(PrefsError::malformed(format!(
                "arrays must be homogeneous, found {} and {}",
                kind,
                other.kind()
            )));
        }
    }

    Ok(values)
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Object(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mixed_numeric_array_promotes_to_float() {
        let value = Value::from_json(&json!([1, 2.5, 3])).unwrap().unwrap();
        assert_eq!(
            value,
            Value::Array(vec![Value::Float(1.0), Value::Float(2.5), Value::Float(3.0)])
        );
    }

    #[test]
    fn test_heterogeneous_array_rejected() {
        let err = Value::from_json(&json!([1, "two"])).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::MalformedContent);
    }

    #[test]
    fn test_nested_array_rejected() {
        assert!(Value::from_json(&json!([[1], [2]])).is_err());
        assert!(Value::from_json(&json!([{"a": 1}])).is_err());
        assert!(Value::from_json(&json!([null])).is_err());
    }

    #[test]
    fn test_null_is_dropped() {
        assert_eq!(Value::from_json(&json!(null)).unwrap(), None);
    }

    #[test]
    fn test_large_unsigned_becomes_float() {
        let value = Value::from_json(&json!(u64::MAX)).unwrap().unwrap();
        assert_eq!(value.kind(), ValueKind::Float);
    }

    #[test]
    fn test_supported() {
        assert!(Value::from(vec![1, 2, 3]).is_supported());
        assert!(Value::Array(vec![]).is_supported());
        assert!(!Value::Array(vec![Value::Int(1), Value::Bool(true)]).is_supported());
        assert!(!Value::Float(f64::NAN).is_supported());
        assert!(!Value::Array(vec![Value::Array(vec![])]).is_supported());
    }

    #[test]
    fn test_text_forms() {
        assert_eq!(Value::Int(30).as_text().as_deref(), Some("30"));
        assert_eq!(Value::Float(1.5).as_text().as_deref(), Some("1.5"));
        assert_eq!(Value::Bool(false).as_text().as_deref(), Some("false"));
        assert_eq!(Value::from(vec![1]).as_text(), None);
    }
}
