use thiserror::Error;

/// Errors raised while declaring tables, indexes and relationships.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{table} table's item shape includes reserved version attribute \"{attribute}\".")]
    VersionAttributeCollision { table: String, attribute: String },
    #[error("{table} table's item shape does not declare key attribute \"{attribute}\".")]
    UnknownKeyAttribute { table: String, attribute: String },
    #[error("{table} table's key attribute \"{attribute}\" must be a string or number.")]
    InvalidKeyAttribute { table: String, attribute: String },
    #[error("Table {0} is already declared.")]
    DuplicateTable(String),
    #[error("Table {0} is not declared.")]
    UnknownTable(String),
    #[error("{table} table's item shape does not declare pointer attribute \"{attribute}\".")]
    UnknownPointerAttribute { table: String, attribute: String },
    #[error("{table} table's key attribute \"{attribute}\" cannot be used as a pointer.")]
    KeyAttributeAsPointer { table: String, attribute: String },
    #[error("{table} table's pointer attribute \"{attribute}\" must hold {expected}.")]
    PointerTypeMismatch {
        table: String,
        attribute: String,
        expected: &'static str,
    },
    #[error("Relationship from {table}.{attribute} to {peer_table} already exists.")]
    RelationshipAlreadyExists {
        table: String,
        attribute: String,
        peer_table: String,
    },
}
