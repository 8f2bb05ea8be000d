//! Item shapes: strict, declarative validators for stored items.
//!
//! A shape lists every attribute an item may carry. Validation rejects
//! undeclared attributes, reports the first offending attribute path, and
//! normalizes the item by dropping `null` values held by optional attributes
//! (at any nesting depth).

use serde_json::{Map, Value};
use thiserror::Error;

use crate::item::Item;

/// Why an attribute failed validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShapeErrorReason {
    #[error("required attribute is missing")]
    Missing,
    #[error("attribute is not declared by the shape")]
    Unexpected,
    #[error("expected {expected}")]
    WrongType { expected: String },
    #[error("value does not match any variant of the shape")]
    NoMatchingVariant,
}

/// A validation failure for a single attribute path.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Invalid attribute \"{path}\": {reason}")]
pub struct ShapeError {
    /// Dotted path to the attribute, with `[i]` for list elements.
    pub path: String,
    pub reason: ShapeErrorReason,
}

impl ShapeError {
    fn new(path: impl Into<String>, reason: ShapeErrorReason) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }

    /// Returns true when the failure is a missing required attribute.
    pub fn is_missing(&self) -> bool {
        matches!(self.reason, ShapeErrorReason::Missing)
    }
}

// ============================================================================
// Attribute types
// ============================================================================

/// The type of a single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number,
    /// A number without a fractional part.
    Integer,
    Boolean,
    Null,
    /// Exactly this value.
    Literal(Value),
    /// A list whose elements all have the given type.
    List(Box<AttributeType>),
    /// A free-form object.
    Map,
    /// A nested object with its own strict shape.
    Object(ObjectShape),
    /// Any of the listed types, tried in order.
    OneOf(Vec<AttributeType>),
    Any,
}

impl AttributeType {
    pub fn list(element: AttributeType) -> Self {
        Self::List(Box::new(element))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Returns true when values of this type can serve as key attributes or
    /// single pointers (strings and numbers only).
    pub fn is_scalar(&self) -> bool {
        match self {
            Self::String | Self::Number | Self::Integer => true,
            Self::Literal(value) => value.is_string() || value.is_number(),
            Self::OneOf(types) => !types.is_empty() && types.iter().all(Self::is_scalar),
            _ => false,
        }
    }

    /// Returns true when values of this type are lists of scalars.
    pub fn is_scalar_list(&self) -> bool {
        match self {
            Self::List(element) => element.is_scalar(),
            Self::OneOf(types) => !types.is_empty() && types.iter().all(Self::is_scalar_list),
            _ => false,
        }
    }

    /// Returns true when the value validates against this type.
    pub fn accepts(&self, value: &Value) -> bool {
        self.validate(value, "").is_ok()
    }

    fn describe(&self) -> String {
        match self {
            Self::String => "a string".to_string(),
            Self::Number => "a number".to_string(),
            Self::Integer => "an integer".to_string(),
            Self::Boolean => "a boolean".to_string(),
            Self::Null => "null".to_string(),
            Self::Literal(value) => format!("the literal {value}"),
            Self::List(element) => format!("a list of {}", element.describe()),
            Self::Map | Self::Object(_) => "an object".to_string(),
            Self::OneOf(types) => types
                .iter()
                .map(Self::describe)
                .collect::<Vec<_>>()
                .join(" or "),
            Self::Any => "any value".to_string(),
        }
    }

    fn validate(&self, value: &Value, path: &str) -> Result<Value, ShapeError> {
        let wrong_type = || {
            ShapeError::new(
                path,
                ShapeErrorReason::WrongType {
                    expected: self.describe(),
                },
            )
        };

        match self {
            Self::Any => Ok(value.clone()),
            Self::String if value.is_string() => Ok(value.clone()),
            Self::Number if value.is_number() => Ok(value.clone()),
            Self::Integer if is_integer(value) => Ok(value.clone()),
            Self::Boolean if value.is_boolean() => Ok(value.clone()),
            Self::Null if value.is_null() => Ok(Value::Null),
            Self::Literal(expected) if expected == value => Ok(value.clone()),
            Self::Map if value.is_object() => Ok(value.clone()),
            Self::List(element) => {
                let values = value.as_array().ok_or_else(wrong_type)?;
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| element.validate(v, &format!("{path}[{i}]")))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Self::Object(shape) => {
                let object = value.as_object().ok_or_else(wrong_type)?;
                shape.validate_at(object, path).map(Value::Object)
            }
            Self::OneOf(types) => types
                .iter()
                .find_map(|t| t.validate(value, path).ok())
                .ok_or_else(wrong_type),
            _ => Err(wrong_type()),
        }
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        _ => false,
    }
}

/// A declared attribute of an object shape.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeShape {
    pub name: String,
    pub kind: AttributeType,
    pub optional: bool,
}

// ============================================================================
// Object shapes
// ============================================================================

/// A strict object shape: the declared attributes and nothing else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectShape {
    attributes: Vec<AttributeShape>,
}

impl ObjectShape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a required attribute.
    pub fn required(mut self, name: impl Into<String>, kind: AttributeType) -> Self {
        self.attributes.push(AttributeShape {
            name: name.into(),
            kind,
            optional: false,
        });
        self
    }

    /// Declares an optional attribute. A `null` value is treated as absent.
    pub fn optional(mut self, name: impl Into<String>, kind: AttributeType) -> Self {
        self.attributes.push(AttributeShape {
            name: name.into(),
            kind,
            optional: true,
        });
        self
    }

    pub fn attributes(&self) -> &[AttributeShape] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeShape> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Validates an item against this shape and returns its normalized form.
    pub fn validate(&self, item: &Item) -> Result<Item, ShapeError> {
        self.validate_at(item, "")
    }

    fn validate_at(&self, object: &Map<String, Value>, prefix: &str) -> Result<Item, ShapeError> {
        let path_of = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}.{name}")
            }
        };

        let mut normalized = Map::new();
        for attribute in &self.attributes {
            let path = path_of(&attribute.name);
            match object.get(&attribute.name) {
                None => {
                    if !attribute.optional {
                        return Err(ShapeError::new(path, ShapeErrorReason::Missing));
                    }
                }
                Some(Value::Null)
                    if attribute.optional && !matches!(attribute.kind, AttributeType::Null) =>
                {
                    // Optional nulls are dropped.
                }
                Some(value) => {
                    let value = attribute.kind.validate(value, &path)?;
                    normalized.insert(attribute.name.clone(), value);
                }
            }
        }

        if let Some(name) = object.keys().find(|name| self.attribute(name).is_none()) {
            return Err(ShapeError::new(path_of(name), ShapeErrorReason::Unexpected));
        }

        Ok(normalized)
    }
}

// ============================================================================
// Item shapes
// ============================================================================

/// The shape of a table's items: a single object shape or a union of them.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemShape {
    Object(ObjectShape),
    Union(Vec<ObjectShape>),
}

impl ItemShape {
    /// The object shapes an item may match.
    pub fn variants(&self) -> &[ObjectShape] {
        match self {
            Self::Object(shape) => std::slice::from_ref(shape),
            Self::Union(shapes) => shapes,
        }
    }

    /// Validates an item and returns its normalized form.
    ///
    /// For unions the first matching variant wins. When no variant matches
    /// and every variant failed only because a required attribute is absent,
    /// the first such failure is returned so callers can still recognize an
    /// incomplete item.
    pub fn validate(&self, item: &Item) -> Result<Item, ShapeError> {
        match self {
            Self::Object(shape) => shape.validate(item),
            Self::Union(shapes) => {
                let mut failures = Vec::with_capacity(shapes.len());
                for shape in shapes {
                    match shape.validate(item) {
                        Ok(normalized) => return Ok(normalized),
                        Err(error) => failures.push(error),
                    }
                }
                if !failures.is_empty() && failures.iter().all(ShapeError::is_missing) {
                    return Err(failures.swap_remove(0));
                }
                Err(ShapeError::new("", ShapeErrorReason::NoMatchingVariant))
            }
        }
    }

    /// Every attribute name declared by any variant, in declaration order.
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for shape in self.variants() {
            for attribute in shape.attributes() {
                if !names.contains(&attribute.name) {
                    names.push(attribute.name.clone());
                }
            }
        }
        names
    }

    /// The types an attribute may hold across all variants.
    pub fn attribute_types(&self, name: &str) -> Vec<&AttributeType> {
        self.variants()
            .iter()
            .filter_map(|shape| shape.attribute(name))
            .map(|attribute| &attribute.kind)
            .collect()
    }

    pub fn declares(&self, name: &str) -> bool {
        self.variants().iter().any(|s| s.attribute(name).is_some())
    }
}

impl From<ObjectShape> for ItemShape {
    fn from(shape: ObjectShape) -> Self {
        Self::Object(shape)
    }
}
