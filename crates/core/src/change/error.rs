use thiserror::Error;

use crate::schema::RelationshipKind;

/// Errors raised while planning the writes of a commit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChangeError {
    #[error("More than one committed item claims key {key} in table {table}")]
    DuplicateKey { table: String, key: String },
    #[error("Item in table {table} is missing key attribute \"{attribute}\"")]
    MissingKeyAttribute { table: String, attribute: String },
}

/// A commit would leave a relationship's pointers inconsistent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Item violates {kind} relationship between {table} and {peer_table}: {item}")]
pub struct RelationshipViolation {
    /// The offending item, rendered as JSON.
    pub item: String,
    pub kind: RelationshipKind,
    pub table: String,
    pub peer_table: String,
}
