//! Transactional, relationship-aware item client for DynamoDB-style
//! key-value stores.
//!
//! Tables are declared with an item shape and key attributes, related
//! through pointer attributes, and read into [`Tracked`] items. Changes to
//! any number of tracked items are committed as one version-guarded
//! transaction.

pub mod client;
pub mod config;
pub mod storage;
pub mod tracking;

pub use client::{
    Client, ClientOptions, CommitItems, ErrorOverride, GetItem, GetItems, ItemsPage, QueryItems,
    ScanItems,
};
pub use config::Config;
pub use tracking::{ItemMetadata, Tracked, TrackedItem};

pub use tabletx_core::{change, expression, pagination, schema, store};
pub use tabletx_core::{Error, Item, Key, Result};
