use std::collections::BTreeMap;

use serde_json::Value;

use crate::item::{Item, Key};

/// Alias maps shared by the expressions of a single request.
pub type AttributeNames = BTreeMap<String, String>;
pub type AttributeValues = BTreeMap<String, Value>;

/// Maximum number of keys a store accepts in one batch read.
pub const MAX_BATCH_GET_KEYS: usize = 100;

/// Maximum number of operations a store accepts in one transaction.
pub const MAX_TRANSACT_WRITE_ITEMS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct GetItemInput {
    pub table_name: String,
    pub key: Key,
    pub consistent_read: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchGetInput {
    pub table_name: String,
    pub keys: Vec<Key>,
    pub consistent_read: bool,
}

/// Items found by a batch read, plus the keys the store did not get to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetOutput {
    pub items: Vec<Item>,
    pub unprocessed_keys: Vec<Key>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryInput {
    pub table_name: String,
    pub index_name: Option<String>,
    pub consistent_read: bool,
    pub key_condition: String,
    pub filter: Option<String>,
    pub attribute_names: Option<AttributeNames>,
    pub attribute_values: Option<AttributeValues>,
    pub exclusive_start_key: Option<Key>,
    /// Maximum number of items to evaluate.
    pub limit: Option<usize>,
    pub scan_index_forward: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanInput {
    pub table_name: String,
    pub index_name: Option<String>,
    pub consistent_read: bool,
    pub filter: Option<String>,
    pub attribute_names: Option<AttributeNames>,
    pub attribute_values: Option<AttributeValues>,
    pub exclusive_start_key: Option<Key>,
    pub limit: Option<usize>,
}

/// One page of a query or scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    /// Present when more items may follow.
    pub last_evaluated_key: Option<Key>,
}

/// Replaces a whole item.
#[derive(Debug, Clone, PartialEq)]
pub struct PutOperation {
    pub table_name: String,
    pub item: Item,
    pub condition: Option<String>,
    pub attribute_names: Option<AttributeNames>,
    pub attribute_values: Option<AttributeValues>,
}

/// Applies `SET`/`REMOVE` clauses to an item.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOperation {
    pub table_name: String,
    pub key: Key,
    pub update: String,
    pub condition: Option<String>,
    pub attribute_names: Option<AttributeNames>,
    pub attribute_values: Option<AttributeValues>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOperation {
    pub table_name: String,
    pub key: Key,
    pub condition: Option<String>,
    pub attribute_names: Option<AttributeNames>,
    pub attribute_values: Option<AttributeValues>,
}

/// One operation of an atomic write transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOperation {
    Put(PutOperation),
    Update(UpdateOperation),
    Delete(DeleteOperation),
}

impl WriteOperation {
    pub fn table_name(&self) -> &str {
        match self {
            Self::Put(op) => &op.table_name,
            Self::Update(op) => &op.table_name,
            Self::Delete(op) => &op.table_name,
        }
    }
}
