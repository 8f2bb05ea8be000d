mod error;
mod traits;
mod types;

pub use error::{CancellationReason, Result, StoreError, CONDITIONAL_CHECK_FAILED};
pub use traits::Store;
pub use types::{
    AttributeNames, AttributeValues, BatchGetInput, BatchGetOutput, DeleteOperation,
    GetItemInput, Page, PutOperation, QueryInput, ScanInput, UpdateOperation, WriteOperation,
    MAX_BATCH_GET_KEYS, MAX_TRANSACT_WRITE_ITEMS,
};
