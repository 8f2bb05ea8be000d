//! Commit planning: per-key changes, their write operations and the
//! relationship checks that gate them.

mod error;
mod plan;
mod relationships;

pub use error::{ChangeError, RelationshipViolation};
pub use plan::{plan_changes, ItemChange, ItemTransition};
pub use relationships::{key_pointer, validate_relationships};
