//! Pure core of tabletx.
//!
//! Everything here is free of I/O: table and relationship declarations, item
//! shapes, expression compilation, commit planning, paging state and the
//! [`store::Store`] contract the client crate drives.

pub mod change;
pub mod error;
pub mod expression;
pub mod item;
pub mod pagination;
pub mod schema;
pub mod store;

pub use error::{Error, Result};
pub use item::{Item, Key};
