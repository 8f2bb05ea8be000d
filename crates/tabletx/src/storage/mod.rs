//! Store implementations.
//!
//! This module provides concrete implementations of the `Store` trait
//! defined in `tabletx_core::store`, selected at compile time via feature
//! flags.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): in-memory store for tests and local development
//! - `dynamodb`: AWS DynamoDB store using `aws-sdk-dynamodb`
//!
//! Both can be enabled at the same time.
//!
//! # Examples
//!
//! Build with DynamoDB:
//! ```bash
//! cargo build -p tabletx --features dynamodb
//! ```

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryStore;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbStore;
