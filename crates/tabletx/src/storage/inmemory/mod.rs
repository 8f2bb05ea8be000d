//! In-memory storage backend for testing.
//!
//! Stores every table in a `HashMap` wrapped in `Arc<RwLock<_>>` and
//! evaluates condition, key, filter and update expressions itself, so
//! transactions, optimistic locking and paging behave as they do against
//! DynamoDB.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabletx::storage::inmemory::InMemoryStore;
//!
//! let store = InMemoryStore::builder().table(&posts).index(&posts_by_author).build();
//! let client = Client::new(Arc::new(store));
//! ```

mod expression;
mod store;

pub use store::{CallCounts, InMemoryStore, InMemoryStoreBuilder};
