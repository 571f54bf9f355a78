//! Typed reads out of [`Value`].
//!
//! One coercion rule applies to scalar reads and to every element of an
//! array read:
//!
//! | target  | accepted                                                        |
//! |---------|-----------------------------------------------------------------|
//! | integer | `Int`; `Float` truncated toward zero; numeric `String`           |
//! | float   | `Float`; `Int` widened; numeric `String`                         |
//! | bool    | `Bool`; `String` equal to `true`/`false` (ASCII case-insensitive) |
//! | string  | `String`; other scalars in their text form                       |
//!
//! Textual booleans and numbers are accepted because command-line overrides
//! are always stored as strings. Integer targets narrower than `i64`
//! saturate at their bounds.

use super::{Document, Value};

/// Types that can be read out of a [`Value`].
pub trait FromValue: Sized {
    /// Returns `None` when the value cannot be represented as `Self`.
    fn from_value(value: &Value) -> Option<Self>;
}

fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(i) = text.parse::<i64>() {
        return Some(i);
    }
    parse_float(text).map(|f| f.trunc() as i64)
}

fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(f.trunc() as i64),
            Value::String(s) => parse_integer(s),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).map(|i| i.clamp(i32::MIN.into(), i32::MAX.into()) as i32)
    }
}

impl FromValue for u32 {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).map(|i| i.clamp(0, u32::MAX.into()) as u32)
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::String(s) => parse_float(s),
            _ => None,
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Option<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_text()
    }
}

impl FromValue for Document {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_document().cloned()
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_truncates_floats() {
        assert_eq!(i64::from_value(&Value::Float(2.9)), Some(2));
        assert_eq!(i64::from_value(&Value::Float(-2.9)), Some(-2));
        assert_eq!(i32::from_value(&Value::String("7.8".into())), Some(7));
        assert_eq!(i32::from_value(&Value::String(" 42 ".into())), Some(42));
        assert_eq!(i32::from_value(&Value::Bool(true)), None);
    }

    #[test]
    fn test_narrow_integers_saturate() {
        assert_eq!(i32::from_value(&Value::Int(i64::MAX)), Some(i32::MAX));
        assert_eq!(u32::from_value(&Value::Int(-5)), Some(0));
    }

    #[test]
    fn test_bool_accepts_only_bool_or_exact_text() {
        assert_eq!(bool::from_value(&Value::Bool(true)), Some(true));
        assert_eq!(bool::from_value(&Value::String("TRUE".into())), Some(true));
        assert_eq!(bool::from_value(&Value::String("false".into())), Some(false));
        assert_eq!(bool::from_value(&Value::String("yes".into())), None);
        assert_eq!(bool::from_value(&Value::Int(1)), None);
    }

    #[test]
    fn test_float_conversions() {
        assert_eq!(f64::from_value(&Value::Int(3)), Some(3.0));
        assert_eq!(f32::from_value(&Value::String("0.5".into())), Some(0.5));
        assert_eq!(f64::from_value(&Value::String("NaN".into())), None);
    }

    #[test]
    fn test_string_from_scalars_only() {
        assert_eq!(String::from_value(&Value::Int(30)), Some("30".into()));
        assert_eq!(String::from_value(&Value::Object(Document::new())), None);
    }
}
