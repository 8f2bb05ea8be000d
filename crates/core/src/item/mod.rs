//! Item and key values.
//!
//! Items travel through the crate as JSON objects so that every layer (shape
//! validation, expression compilation, stores) works on the same
//! representation. Callers see their own typed values; conversion happens at
//! the client boundary through serde.

mod key;

pub use key::Key;

use serde_json::{Map, Value};

/// A stored item: an ordered map of attribute names to JSON values.
pub type Item = Map<String, Value>;

/// Renders a scalar attribute value as the plain string used in key pointers
/// and alias names. Strings are used as-is, numbers in their canonical form.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_string_uses_raw_strings() {
        assert_eq!(scalar_string(&json!("abc")), Some("abc".to_string()));
    }

    #[test]
    fn test_scalar_string_formats_numbers() {
        assert_eq!(scalar_string(&json!(42)), Some("42".to_string()));
        assert_eq!(scalar_string(&json!(1.5)), Some("1.5".to_string()));
    }

    #[test]
    fn test_scalar_string_rejects_composites() {
        assert_eq!(scalar_string(&json!(["a"])), None);
        assert_eq!(scalar_string(&json!({"a": 1})), None);
        assert_eq!(scalar_string(&Value::Null), None);
    }
}
