use async_trait::async_trait;

use crate::item::Item;

use super::types::{
    BatchGetInput, BatchGetOutput, GetItemInput, Page, QueryInput, ScanInput, WriteOperation,
};
use super::Result;

/// The key-value store the client talks to.
///
/// Implementations speak the store's request and response shapes; the
/// client owns alias allocation, paging, versioning and relationship rules.
#[async_trait]
pub trait Store: Send + Sync {
    /// Reads a single item by key.
    async fn get_item(&self, input: GetItemInput) -> Result<Option<Item>>;

    /// Reads up to 100 items by key. Keys the store did not get to are
    /// returned as unprocessed.
    async fn batch_get_items(&self, input: BatchGetInput) -> Result<BatchGetOutput>;

    /// Reads one page of items matching a key condition.
    async fn query(&self, input: QueryInput) -> Result<Page>;

    /// Reads one page of a table or index scan.
    async fn scan(&self, input: ScanInput) -> Result<Page>;

    /// Applies all operations atomically, or none of them.
    async fn transact_write(&self, operations: Vec<WriteOperation>) -> Result<()>;
}
