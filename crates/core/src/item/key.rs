use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Item;

/// The primary key of an item: the partition key attribute and, when the
/// table has one, the sort key attribute.
///
/// Keys compare structurally, so a key built by a caller matches the key
/// extracted from a stored item regardless of attribute order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(BTreeMap<String, Value>);

impl Key {
    /// Creates an empty key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key attribute.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Extracts the named key attributes from an item.
    ///
    /// Returns the name of the first absent attribute on failure.
    pub fn from_item<S: AsRef<str>>(names: &[S], item: &Item) -> Result<Self, String> {
        let mut attributes = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            match item.get(name) {
                Some(value) if !value.is_null() => {
                    attributes.insert(name.to_string(), value.clone());
                }
                _ => return Err(name.to_string()),
            }
        }
        Ok(Self(attributes))
    }

    /// Returns the value of a key attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts the key into an item holding only the key attributes.
    pub fn into_item(self) -> Item {
        self.0.into_iter().collect()
    }

    /// Returns a copy of the key as an item.
    pub fn to_item(&self) -> Item {
        self.0
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl FromIterator<(String, Value)> for Key {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
