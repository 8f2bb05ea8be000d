//! Tracked items: a caller's item value bundled with the persistence
//! metadata the client needs to commit it.
//!
//! Only a [`Client`](crate::Client) creates tracked items (through a read or
//! a draft), so an item without metadata cannot reach a commit. Metadata
//! lives as long as the handle; dropping the handle forgets the item.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use tabletx_core::schema::TableDefinition;
use tabletx_core::{Item, Result};

use crate::client::to_item;

/// Persistence metadata of a tracked item.
#[derive(Debug, Clone)]
pub struct ItemMetadata {
    client_id: Uuid,
    table: Arc<TableDefinition>,
    prior_snapshot: Option<Item>,
    version: u64,
    is_newly_created: bool,
    is_marked_for_deletion: bool,
    is_detached: bool,
}

impl ItemMetadata {
    /// Metadata of an item read from the store at `version`.
    pub(crate) fn persisted(
        client_id: Uuid,
        table: Arc<TableDefinition>,
        snapshot: Item,
        version: u64,
    ) -> Self {
        Self {
            client_id,
            table,
            prior_snapshot: Some(snapshot),
            version,
            is_newly_created: false,
            is_marked_for_deletion: false,
            is_detached: false,
        }
    }

    /// Metadata of an item that exists only locally.
    pub(crate) fn drafted(client_id: Uuid, table: Arc<TableDefinition>) -> Self {
        Self {
            client_id,
            table,
            prior_snapshot: None,
            version: 0,
            is_newly_created: true,
            is_marked_for_deletion: false,
            is_detached: false,
        }
    }

    pub fn table(&self) -> &Arc<TableDefinition> {
        &self.table
    }

    /// The last known stored representation, `None` for unsaved drafts.
    pub fn prior_snapshot(&self) -> Option<&Item> {
        self.prior_snapshot.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_newly_created(&self) -> bool {
        self.is_newly_created
    }

    pub fn is_marked_for_deletion(&self) -> bool {
        self.is_marked_for_deletion
    }

    /// True once the item's deletion has been committed.
    pub fn is_detached(&self) -> bool {
        self.is_detached
    }

    pub(crate) fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub(crate) fn mark_for_deletion(&mut self) {
        self.is_marked_for_deletion = true;
    }

    /// Records a successful write of `snapshot` at `version`.
    pub(crate) fn committed(&mut self, snapshot: Item, version: u64) {
        self.prior_snapshot = Some(snapshot);
        self.version = version;
        self.is_newly_created = false;
    }

    pub(crate) fn detach(&mut self) {
        self.is_detached = true;
        self.prior_snapshot = None;
    }
}

/// Object-safe view of a tracked item, so items of different types can be
/// committed together.
pub trait TrackedItem: Send {
    /// Serializes the current item value.
    fn to_item(&self) -> Result<Item>;

    fn metadata(&self) -> &ItemMetadata;

    fn metadata_mut(&mut self) -> &mut ItemMetadata;
}

/// An item of type `T` tracked by a client.
///
/// Dereferences to `T`, so fields can be read and mutated in place before a
/// commit.
pub struct Tracked<T> {
    item: T,
    metadata: ItemMetadata,
}

impl<T> Tracked<T> {
    pub(crate) fn new(item: T, metadata: ItemMetadata) -> Self {
        Self { item, metadata }
    }

    pub fn metadata(&self) -> &ItemMetadata {
        &self.metadata
    }

    /// Gives up tracking and returns the plain item.
    pub fn into_inner(self) -> T {
        self.item
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T> DerefMut for Tracked<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.item
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("item", &self.item)
            .field("table", &self.metadata.table.name())
            .field("version", &self.metadata.version)
            .finish()
    }
}

impl<T> TrackedItem for Tracked<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    fn to_item(&self) -> Result<Item> {
        to_item(&self.item)
    }

    fn metadata(&self) -> &ItemMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ItemMetadata {
        &mut self.metadata
    }
}
