use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;

use crate::item::Key;
use crate::schema::ItemShape;

/// A resume token that is not the encoding of a valid last-evaluated key
/// for the source being read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid resume token: {0}")]
pub struct InvalidResumeToken(pub String);

/// Encodes a last-evaluated key as an opaque resume token.
pub fn encode_resume_token(key: &Key) -> String {
    key.to_string()
}

/// Decodes a resume token, checking that it holds exactly the expected key
/// attributes with values their declared types accept.
pub fn decode_resume_token(
    token: &str,
    key_attribute_names: &[String],
    shape: &ItemShape,
) -> Result<Key, InvalidResumeToken> {
    let value: Value = serde_json::from_str(token)
        .map_err(|e| InvalidResumeToken(format!("not JSON: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| InvalidResumeToken("not an object".to_string()))?;

    let expected: BTreeSet<&str> = key_attribute_names.iter().map(String::as_str).collect();
    let found: BTreeSet<&str> = object.keys().map(String::as_str).collect();
    if expected != found {
        return Err(InvalidResumeToken(format!(
            "expected attributes {expected:?}, found {found:?}"
        )));
    }

    for (name, value) in object {
        if !value.is_string() && !value.is_number() {
            return Err(InvalidResumeToken(format!(
                "attribute \"{name}\" is not a string or number"
            )));
        }
        let types = shape.attribute_types(name);
        if !types.is_empty() && !types.iter().any(|t| t.accepts(value)) {
            return Err(InvalidResumeToken(format!(
                "attribute \"{name}\" has the wrong type"
            )));
        }
    }

    Ok(object
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect())
}
