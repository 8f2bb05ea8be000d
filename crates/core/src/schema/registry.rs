use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::relationship::{Relationship, RelationshipKind};
use super::table::{Table, TableDefinition};
use super::SchemaError;

/// Collects table declarations and the relationships between them.
///
/// Relationships are registered on both tables at once: the declared edge on
/// the first table and its flipped mirror on the peer.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    tables: Vec<TableDefinition>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, definition: TableDefinition) -> Result<Self, SchemaError> {
        if self.tables.iter().any(|t| t.name() == definition.name()) {
            return Err(SchemaError::DuplicateTable(definition.name().to_string()));
        }
        self.tables.push(definition);
        Ok(self)
    }

    /// Declares a relationship from `table` to `relationship.peer_table`.
    ///
    /// Fails when the same edge (pointer attribute and peer table) already
    /// exists on `table`. An existing mirror on the peer is left untouched.
    pub fn relationship(
        mut self,
        table: &str,
        relationship: Relationship,
    ) -> Result<Self, SchemaError> {
        let source = self.position(table)?;
        let peer = self.position(&relationship.peer_table)?;

        check_pointer(
            &self.tables[source],
            &relationship.pointer_attribute,
            relationship.kind,
        )?;
        check_pointer(
            &self.tables[peer],
            &relationship.peer_pointer_attribute,
            relationship.kind.flip(),
        )?;

        if self.tables[source]
            .relationships()
            .iter()
            .any(|existing| existing.same_edge(&relationship))
        {
            return Err(SchemaError::RelationshipAlreadyExists {
                table: table.to_string(),
                attribute: relationship.pointer_attribute,
                peer_table: relationship.peer_table,
            });
        }

        let mirror = relationship.flipped(table);
        debug!(
            table = %table,
            peer_table = %relationship.peer_table,
            kind = %relationship.kind,
            "Declaring relationship"
        );
        self.tables[source].push_relationship(relationship);

        let mirror_exists = self.tables[peer]
            .relationships()
            .iter()
            .any(|existing| existing.same_edge(&mirror));
        if !mirror_exists {
            self.tables[peer].push_relationship(mirror);
        }

        Ok(self)
    }

    pub fn build(self) -> Schema {
        let tables = self
            .tables
            .into_iter()
            .map(|t| (t.name().to_string(), Arc::new(t)))
            .collect();
        Schema { tables }
    }

    fn position(&self, name: &str) -> Result<usize, SchemaError> {
        self.tables
            .iter()
            .position(|t| t.name() == name)
            .ok_or_else(|| SchemaError::UnknownTable(name.to_string()))
    }
}

fn check_pointer(
    table: &TableDefinition,
    attribute: &str,
    kind: RelationshipKind,
) -> Result<(), SchemaError> {
    let types = table.shape().attribute_types(attribute);
    if types.is_empty() {
        return Err(SchemaError::UnknownPointerAttribute {
            table: table.name().to_string(),
            attribute: attribute.to_string(),
        });
    }
    if table.is_key_attribute(attribute) {
        return Err(SchemaError::KeyAttributeAsPointer {
            table: table.name().to_string(),
            attribute: attribute.to_string(),
        });
    }

    let (valid, expected) = if kind.points_to_many() {
        (types.iter().all(|t| t.is_scalar_list()), "a list of key pointers")
    } else {
        (types.iter().all(|t| t.is_scalar()), "a single key pointer")
    };
    if !valid {
        return Err(SchemaError::PointerTypeMismatch {
            table: table.name().to_string(),
            attribute: attribute.to_string(),
            expected,
        });
    }
    Ok(())
}

/// A frozen set of table declarations.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: HashMap<String, Arc<TableDefinition>>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Returns a typed handle to a declared table.
    pub fn table<T>(&self, name: &str) -> Result<Table<T>, SchemaError> {
        self.definition(name)
            .map(|definition| Table::from_definition(Arc::clone(definition)))
            .ok_or_else(|| SchemaError::UnknownTable(name.to_string()))
    }

    pub fn definition(&self, name: &str) -> Option<&Arc<TableDefinition>> {
        self.tables.get(name)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<TableDefinition>> {
        self.tables.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::shape::{AttributeType, ObjectShape};

    fn users() -> TableDefinition {
        let shape = ObjectShape::new()
            .required("id", AttributeType::String)
            .required("postIds", AttributeType::list(AttributeType::String))
            .optional("profileId", AttributeType::String);
        TableDefinition::builder("Users", shape, "id").build().unwrap()
    }

    fn posts() -> TableDefinition {
        let shape = ObjectShape::new()
            .required("id", AttributeType::String)
            .required("authorId", AttributeType::String);
        TableDefinition::builder("Posts", shape, "id").build().unwrap()
    }

    fn builder() -> SchemaBuilder {
        Schema::builder()
            .table(users())
            .unwrap()
            .table(posts())
            .unwrap()
    }

    fn users_to_posts() -> Relationship {
        Relationship::new(RelationshipKind::OneToMany, "postIds", "Posts", "authorId")
    }

    #[test]
    fn test_relationship_is_mirrored() {
        let schema = builder()
            .relationship("Users", users_to_posts())
            .unwrap()
            .build();

        let users = schema.definition("Users").unwrap();
        let posts = schema.definition("Posts").unwrap();
        assert_eq!(users.relationships().len(), 1);
        assert_eq!(posts.relationships().len(), 1);

        let mirror = &posts.relationships()[0];
        assert_eq!(mirror.kind, RelationshipKind::ManyToOne);
        assert_eq!(mirror.pointer_attribute, "authorId");
        assert_eq!(mirror.peer_table, "Users");
        assert_eq!(mirror.peer_pointer_attribute, "postIds");
    }

    #[test]
    fn test_duplicate_relationship_fails() {
        let error = builder()
            .relationship("Users", users_to_posts())
            .unwrap()
            .relationship("Users", users_to_posts())
            .unwrap_err();
        assert!(matches!(error, SchemaError::RelationshipAlreadyExists { .. }));
    }

    #[test]
    fn test_declaring_the_mirror_explicitly_fails() {
        let mirror = Relationship::new(RelationshipKind::ManyToOne, "authorId", "Users", "postIds");
        let error = builder()
            .relationship("Users", users_to_posts())
            .unwrap()
            .relationship("Posts", mirror)
            .unwrap_err();
        assert!(matches!(error, SchemaError::RelationshipAlreadyExists { .. }));
    }

    #[test]
    fn test_pointer_must_not_be_key() {
        let relationship = Relationship::new(RelationshipKind::OneToOne, "id", "Posts", "authorId");
        let error = builder().relationship("Users", relationship).unwrap_err();
        assert!(matches!(error, SchemaError::KeyAttributeAsPointer { .. }));
    }

    #[test]
    fn test_pointer_type_must_match_kind() {
        let relationship =
            Relationship::new(RelationshipKind::OneToOne, "postIds", "Posts", "authorId");
        let error = builder().relationship("Users", relationship).unwrap_err();
        assert!(matches!(error, SchemaError::PointerTypeMismatch { .. }));
    }

    #[test]
    fn test_unknown_peer_table() {
        let relationship = Relationship::new(RelationshipKind::OneToOne, "profileId", "Profiles", "userId");
        let error = builder().relationship("Users", relationship).unwrap_err();
        assert_eq!(error, SchemaError::UnknownTable("Profiles".to_string()));
    }

    #[test]
    fn test_typed_table_handle() {
        struct User;
        let schema = builder().build();
        let table = schema.table::<User>("Users").unwrap();
        assert_eq!(table.name(), "Users");
        assert!(schema.table::<User>("Nope").is_err());
    }
}
