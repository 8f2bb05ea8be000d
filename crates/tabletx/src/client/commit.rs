use std::sync::Arc;

use tracing::{debug, warn};

use tabletx_core::change::{plan_changes, validate_relationships, ItemChange, ItemTransition};
use tabletx_core::store::WriteOperation;
use tabletx_core::{Error, Result};

use super::{apply_override, Client, ErrorOverride};
use crate::tracking::TrackedItem;

/// An atomic commit of tracked items. Created by [`Client::commit`].
///
/// Every item is validated against its table's shape, relationship pointers
/// are checked across the whole set, and all writes are sent as one
/// transaction guarded by item versions. Nothing is written when any check
/// fails.
#[must_use = "requests do nothing until `send` is awaited"]
pub struct CommitItems<'a, 'b> {
    client: &'a Client,
    items: &'a mut [&'b mut dyn TrackedItem],
    optimistic_lock: Option<ErrorOverride<'a>>,
}

impl<'a, 'b> CommitItems<'a, 'b> {
    pub(super) fn new(client: &'a Client, items: &'a mut [&'b mut dyn TrackedItem]) -> Self {
        Self {
            client,
            items,
            optimistic_lock: None,
        }
    }

    /// Replaces the error raised when another writer got there first.
    pub fn map_optimistic_lock(mut self, map: impl FnOnce(Error) -> Error + Send + 'a) -> Self {
        self.optimistic_lock = Some(Box::new(map));
        self
    }

    pub async fn send(self) -> Result<()> {
        if self.items.is_empty() {
            return Ok(());
        }

        let mut transitions = Vec::with_capacity(self.items.len());
        for item in self.items.iter() {
            let metadata = item.metadata();
            self.client.ensure_tracked(metadata)?;

            let table = Arc::clone(metadata.table());
            let current = table.shape().validate(&item.to_item()?)?;
            transitions.push(ItemTransition {
                version: (!metadata.is_newly_created()).then(|| metadata.version()),
                old_item: metadata.prior_snapshot().cloned(),
                new_item: (!metadata.is_marked_for_deletion()).then_some(current),
                table,
            });
        }

        let changes = plan_changes(&transitions)?;
        validate_relationships(&changes)?;

        let operations: Vec<WriteOperation> = changes
            .iter()
            .filter_map(ItemChange::write_operation)
            .collect();

        if !operations.is_empty() {
            debug!(
                items = self.items.len(),
                operations = operations.len(),
                "Committing items"
            );
            match self.client.store().transact_write(operations).await {
                Ok(()) => {}
                Err(error) if error.is_optimistic_lock_failure() => {
                    warn!(error = %error, "Commit rejected by optimistic lock");
                    return Err(apply_override(Error::OptimisticLock, self.optimistic_lock));
                }
                Err(error) => return Err(error.into()),
            }
        }

        let mut written_versions = vec![None; self.items.len()];
        for change in &changes {
            if let Some(source) = change.new_source {
                written_versions[source] = change.written_version();
            }
        }

        for ((item, transition), written_version) in self
            .items
            .iter_mut()
            .zip(transitions)
            .zip(written_versions)
        {
            let metadata = item.metadata_mut();
            match transition.new_item {
                Some(snapshot) => metadata.committed(snapshot, written_version.unwrap_or(0)),
                None => metadata.detach(),
            }
        }
        Ok(())
    }
}
