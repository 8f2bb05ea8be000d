//! DynamoDB storage backend implementation.
//!
//! This module provides a DynamoDB-based implementation of the `Store`
//! trait using `aws-sdk-dynamodb`. Tables and indexes must already exist.

mod conversions;
mod error;
mod store;

pub use store::DynamoDbStore;
