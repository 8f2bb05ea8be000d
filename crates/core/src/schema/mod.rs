//! Table, index and relationship declarations.

mod error;
mod index;
mod registry;
mod relationship;
mod shape;
mod table;

pub use error::SchemaError;
pub use index::{Projection, Queryable, SecondaryIndex};
pub use registry::{Schema, SchemaBuilder};
pub use relationship::{
    Exemption, Relationship, RelationshipKind, DEFAULT_COMPOSITE_KEY_SEPARATOR,
};
pub use shape::{
    AttributeShape, AttributeType, ItemShape, ObjectShape, ShapeError, ShapeErrorReason,
};
pub use table::{Table, TableBuilder, TableDefinition, DEFAULT_VERSION_ATTRIBUTE};
