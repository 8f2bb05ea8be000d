//! The transactional client.
//!
//! Reads hand out [`Tracked`] items; callers mutate them in place and pass
//! them back to [`Client::commit_items`], which turns every pending change
//! into a single version-guarded transaction.

mod batch;
mod commit;
mod get;
mod options;
mod query;

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use tabletx_core::expression::PartitionKeyCondition;
use tabletx_core::schema::{Queryable, Table, TableDefinition};
use tabletx_core::store::Store;
use tabletx_core::{Error, Item, Key, Result};

use crate::config::Config;
use crate::tracking::{ItemMetadata, Tracked, TrackedItem};

pub use batch::GetItems;
pub use commit::CommitItems;
pub use get::GetItem;
pub use options::ClientOptions;
pub use query::{ItemsPage, QueryItems, ScanItems};

/// Replaces an overridable error at the call site.
pub type ErrorOverride<'a> = Box<dyn FnOnce(Error) -> Error + Send + 'a>;

fn apply_override(error: Error, error_override: Option<ErrorOverride<'_>>) -> Error {
    match error_override {
        Some(map) => map(error),
        None => error,
    }
}

/// Client for reading and transactionally writing versioned items.
#[derive(Clone)]
pub struct Client {
    store: Arc<dyn Store>,
    id: Uuid,
    options: ClientOptions,
}

impl Client {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_options(store, ClientOptions::default())
    }

    pub fn with_options(store: Arc<dyn Store>, options: ClientOptions) -> Self {
        let id = Uuid::new_v4();
        debug!(client_id = %id, "Creating client");
        Self { store, id, options }
    }

    pub fn from_config(store: Arc<dyn Store>, config: &Config) -> Self {
        Self::with_options(store, ClientOptions::from(config))
    }

    /// Identifies the items this client tracks.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Starts tracking a new item that will be created on commit.
    ///
    /// The item is validated against the table's shape and returned in its
    /// normalized form. No request is made.
    pub fn draft_item<T>(&self, table: &Table<T>, item: T) -> Result<Tracked<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let definition = table.definition();
        let mut raw = to_item(&item)?;
        raw.remove(definition.version_attribute());
        let normalized = definition.shape().validate(&raw)?;
        let item = serde_json::from_value(Value::Object(normalized))?;

        debug!(table = %definition.name(), "Drafted item");
        Ok(Tracked::new(
            item,
            ItemMetadata::drafted(self.id, Arc::clone(definition)),
        ))
    }

    /// Reads one item by key with a strongly consistent read.
    pub fn get_item<'a, T>(&'a self, table: &'a Table<T>, key: Key) -> GetItem<'a, T>
    where
        T: DeserializeOwned,
    {
        GetItem::new(self, table, key)
    }

    /// Reads many items by key, in request order.
    pub fn get_items<'a, T>(&'a self, table: &'a Table<T>, keys: Vec<Key>) -> GetItems<'a, T>
    where
        T: DeserializeOwned,
    {
        GetItems::new(self, table, keys)
    }

    /// Queries a table or secondary index by partition key.
    pub fn query_items<'a, T, I>(
        &'a self,
        index: &'a I,
        partition_key: PartitionKeyCondition,
    ) -> QueryItems<'a, T, I>
    where
        T: DeserializeOwned,
        I: Queryable<T>,
    {
        QueryItems::new(self, index, partition_key)
    }

    /// Scans a table or secondary index.
    pub fn scan_items<'a, T, I>(&'a self, index: &'a I) -> ScanItems<'a, T, I>
    where
        T: DeserializeOwned,
        I: Queryable<T>,
    {
        ScanItems::new(self, index)
    }

    /// Marks an item to be deleted by the next commit that includes it.
    pub fn mark_item_for_deletion<I>(&self, item: &mut I) -> Result<()>
    where
        I: TrackedItem + ?Sized,
    {
        self.ensure_tracked(item.metadata())?;
        if item.metadata().is_marked_for_deletion() {
            return Err(Error::AlreadyMarkedForDeletion);
        }
        item.metadata_mut().mark_for_deletion();
        Ok(())
    }

    /// Returns the stored version of a tracked item.
    pub fn get_item_version<I>(&self, item: &I) -> Result<u64>
    where
        I: TrackedItem + ?Sized,
    {
        self.ensure_tracked(item.metadata())?;
        Ok(item.metadata().version())
    }

    /// Prepares a commit of the given items; see [`CommitItems`].
    pub fn commit<'a, 'b>(
        &'a self,
        items: &'a mut [&'b mut dyn TrackedItem],
    ) -> CommitItems<'a, 'b> {
        CommitItems::new(self, items)
    }

    /// Commits the given items with default error handling.
    pub async fn commit_items(&self, items: &mut [&mut dyn TrackedItem]) -> Result<()> {
        self.commit(items).send().await
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub(crate) fn ensure_tracked(&self, metadata: &ItemMetadata) -> Result<()> {
        if metadata.client_id() != self.id || metadata.is_detached() {
            return Err(Error::UntrackedItem);
        }
        Ok(())
    }

    /// Starts tracking an item read from the store.
    pub(crate) fn record<T: DeserializeOwned>(
        &self,
        table: &Arc<TableDefinition>,
        raw: Item,
    ) -> Result<Tracked<T>> {
        let (snapshot, version) = strip_version(table, raw)?;
        let item = serde_json::from_value(Value::Object(snapshot.clone()))?;
        Ok(Tracked::new(
            item,
            ItemMetadata::persisted(self.id, Arc::clone(table), snapshot, version),
        ))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("options", &self.options)
            .finish()
    }
}

/// Removes the version attribute from a stored item and validates the rest.
pub(crate) fn strip_version(table: &TableDefinition, mut raw: Item) -> Result<(Item, u64)> {
    let version = raw
        .remove(table.version_attribute())
        .and_then(|v| v.as_u64())
        .ok_or_else(|| Error::ItemWithoutVersion {
            table: table.name().to_string(),
            attribute: table.version_attribute().to_string(),
        })?;
    let snapshot = table.shape().validate(&raw)?;
    Ok((snapshot, version))
}

pub(crate) fn to_item<T: Serialize>(item: &T) -> Result<Item> {
    match serde_json::to_value(item)? {
        Value::Object(item) => Ok(item),
        other => Err(Error::Serialization(format!(
            "item must serialize to an object, got {other}"
        ))),
    }
}
