use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::relationship::Relationship;
use super::shape::ItemShape;
use super::SchemaError;

/// Default name of the hidden attribute carrying an item's version.
pub const DEFAULT_VERSION_ATTRIBUTE: &str = "version";

/// The declaration of a table: its name, item shape, key attributes,
/// version attribute and relationships.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    name: String,
    shape: ItemShape,
    partition_key: String,
    sort_key: Option<String>,
    version_attribute: String,
    attribute_names: Vec<String>,
    relationships: Vec<Relationship>,
}

impl TableDefinition {
    /// Starts declaring a table.
    pub fn builder(
        name: impl Into<String>,
        shape: impl Into<ItemShape>,
        partition_key: impl Into<String>,
    ) -> TableBuilder {
        TableBuilder {
            name: name.into(),
            shape: shape.into(),
            partition_key: partition_key.into(),
            sort_key: None,
            version_attribute: DEFAULT_VERSION_ATTRIBUTE.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &ItemShape {
        &self.shape
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    pub fn version_attribute(&self) -> &str {
        &self.version_attribute
    }

    /// Every attribute declared by the item shape, in declaration order.
    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    /// The partition key followed by the sort key, if any.
    pub fn key_attribute_names(&self) -> Vec<String> {
        std::iter::once(self.partition_key.clone())
            .chain(self.sort_key.clone())
            .collect()
    }

    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.partition_key == name || self.sort_key.as_deref() == Some(name)
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub(crate) fn push_relationship(&mut self, relationship: Relationship) {
        self.relationships.push(relationship);
    }
}

/// Builder for [`TableDefinition`].
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    shape: ItemShape,
    partition_key: String,
    sort_key: Option<String>,
    version_attribute: String,
}

impl TableBuilder {
    pub fn sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    /// Overrides the hidden version attribute name (default `version`).
    pub fn version_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.version_attribute = attribute.into();
        self
    }

    /// Validates the declaration.
    ///
    /// Key attributes must be declared scalar attributes and the version
    /// attribute must not appear in the shape.
    pub fn build(self) -> Result<TableDefinition, SchemaError> {
        if self.shape.declares(&self.version_attribute) {
            return Err(SchemaError::VersionAttributeCollision {
                table: self.name,
                attribute: self.version_attribute,
            });
        }

        let key_attributes = std::iter::once(&self.partition_key).chain(self.sort_key.as_ref());
        for attribute in key_attributes {
            let types = self.shape.attribute_types(attribute);
            if types.is_empty() {
                return Err(SchemaError::UnknownKeyAttribute {
                    table: self.name.clone(),
                    attribute: attribute.clone(),
                });
            }
            if !types.iter().all(|t| t.is_scalar()) {
                return Err(SchemaError::InvalidKeyAttribute {
                    table: self.name.clone(),
                    attribute: attribute.clone(),
                });
            }
        }

        let attribute_names = self.shape.attribute_names();
        Ok(TableDefinition {
            name: self.name,
            shape: self.shape,
            partition_key: self.partition_key,
            sort_key: self.sort_key,
            version_attribute: self.version_attribute,
            attribute_names,
            relationships: Vec::new(),
        })
    }
}

/// A typed handle to a declared table.
///
/// `T` is the caller's item type; it must serialize to an object matching
/// the table's shape.
pub struct Table<T> {
    definition: Arc<TableDefinition>,
    _item: PhantomData<fn() -> T>,
}

impl<T> Table<T> {
    /// Wraps a standalone definition (one without relationships).
    pub fn new(definition: TableDefinition) -> Self {
        Self::from_definition(Arc::new(definition))
    }

    pub fn from_definition(definition: Arc<TableDefinition>) -> Self {
        Self {
            definition,
            _item: PhantomData,
        }
    }

    pub fn definition(&self) -> &Arc<TableDefinition> {
        &self.definition
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self::from_definition(Arc::clone(&self.definition))
    }
}

impl<T> fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Table").field(&self.definition.name()).finish()
    }
}
