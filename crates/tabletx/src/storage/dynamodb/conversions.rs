//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between DynamoDB `AttributeValue` maps and
//! JSON items. These are testable in isolation without DynamoDB access.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};

use tabletx_core::store::{AttributeValues, StoreError};
use tabletx_core::{Item, Key};

pub type AttributeMap = HashMap<String, AttributeValue>;

// ============================================================================
// JSON to DynamoDB
// ============================================================================

/// Convert a JSON value to an attribute value.
pub fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute_value).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(name, value)| (name.clone(), to_attribute_value(value)))
                .collect(),
        ),
    }
}

/// Convert an item to a DynamoDB item.
pub fn item_to_attributes(item: &Item) -> AttributeMap {
    item.iter()
        .map(|(name, value)| (name.clone(), to_attribute_value(value)))
        .collect()
}

pub fn key_to_attributes(key: &Key) -> AttributeMap {
    key.iter()
        .map(|(name, value)| (name.clone(), to_attribute_value(value)))
        .collect()
}

/// Convert expression attribute values, keeping `None` for an absent map.
pub fn values_to_attributes(values: Option<&AttributeValues>) -> Option<AttributeMap> {
    values.map(|values| {
        values
            .iter()
            .map(|(alias, value)| (alias.clone(), to_attribute_value(value)))
            .collect()
    })
}

// ============================================================================
// DynamoDB to JSON
// ============================================================================

/// Convert an attribute value to JSON. String and number sets become
/// arrays; binary values are not supported.
pub fn from_attribute_value(value: &AttributeValue) -> Result<Value, StoreError> {
    match value {
        AttributeValue::S(s) => Ok(Value::String(s.clone())),
        AttributeValue::N(n) => parse_number(n),
        AttributeValue::Bool(b) => Ok(Value::Bool(*b)),
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::L(values) => values
            .iter()
            .map(from_attribute_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::M(map) => attributes_to_item(map).map(Value::Object),
        AttributeValue::Ss(values) => Ok(Value::Array(
            values.iter().cloned().map(Value::String).collect(),
        )),
        AttributeValue::Ns(values) => values
            .iter()
            .map(|n| parse_number(n))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::B(_) | AttributeValue::Bs(_) => Err(StoreError::Conversion(
            "binary attributes are not supported".to_string(),
        )),
        other => Err(StoreError::Conversion(format!(
            "unsupported attribute value: {other:?}"
        ))),
    }
}

/// Convert a DynamoDB item to an item.
pub fn attributes_to_item(attributes: &AttributeMap) -> Result<Item, StoreError> {
    let mut item = Map::new();
    for (name, value) in attributes {
        item.insert(name.clone(), from_attribute_value(value)?);
    }
    Ok(item)
}

pub fn attributes_to_key(attributes: &AttributeMap) -> Result<Key, StoreError> {
    let mut key = Key::new();
    for (name, value) in attributes {
        key = key.with(name.clone(), from_attribute_value(value)?);
    }
    Ok(key)
}

fn parse_number(n: &str) -> Result<Value, StoreError> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Value::from(i));
    }
    if let Ok(u) = n.parse::<u64>() {
        return Ok(Value::from(u));
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| StoreError::Conversion(format!("invalid number: {n}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::primitives::Blob;
    use serde_json::json;

    #[test]
    fn test_item_round_trip() {
        let item = json!({
            "id": "post-1",
            "rank": 3,
            "score": 1.5,
            "published": true,
            "summary": null,
            "tags": ["a", "b"],
            "meta": {"views": 10}
        })
        .as_object()
        .cloned()
        .unwrap();

        let attributes = item_to_attributes(&item);
        assert_eq!(attributes["rank"], AttributeValue::N("3".to_string()));
        assert_eq!(attributes["summary"], AttributeValue::Null(true));
        assert_eq!(attributes_to_item(&attributes).unwrap(), item);
    }

    #[test]
    fn test_sets_read_as_arrays() {
        let value = AttributeValue::Ns(vec!["1".to_string(), "2.5".to_string()]);
        assert_eq!(from_attribute_value(&value).unwrap(), json!([1, 2.5]));

        let value = AttributeValue::Ss(vec!["x".to_string()]);
        assert_eq!(from_attribute_value(&value).unwrap(), json!(["x"]));
    }

    #[test]
    fn test_binary_is_rejected() {
        let value = AttributeValue::B(Blob::new(vec![1, 2, 3]));
        assert!(matches!(
            from_attribute_value(&value),
            Err(StoreError::Conversion(_))
        ));
    }

    #[test]
    fn test_large_unsigned_numbers() {
        let value = AttributeValue::N(u64::MAX.to_string());
        assert_eq!(from_attribute_value(&value).unwrap(), json!(u64::MAX));
    }

    #[test]
    fn test_key_conversion() {
        let key = Key::new().with("author", "ann").with("slug", "hello");
        let attributes = key_to_attributes(&key);
        assert_eq!(attributes["author"], AttributeValue::S("ann".to_string()));
        assert_eq!(attributes_to_key(&attributes).unwrap(), key);
    }
}
