use std::collections::{HashMap, VecDeque};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use tabletx_core::schema::Table;
use tabletx_core::store::{BatchGetInput, MAX_BATCH_GET_KEYS};
use tabletx_core::{Error, Item, Key, Result};

use super::{apply_override, Client, ErrorOverride};
use crate::tracking::Tracked;

/// A batch read of many items by key. Created by [`Client::get_items`].
///
/// Keys are sent in chunks of at most 100; keys the store leaves
/// unprocessed are queued again. Results follow the order of the requested
/// keys.
#[must_use = "requests do nothing until `send` is awaited"]
pub struct GetItems<'a, T> {
    client: &'a Client,
    table: &'a Table<T>,
    keys: Vec<Key>,
    not_found: Option<ErrorOverride<'a>>,
    omit_missing: bool,
}

impl<'a, T> GetItems<'a, T>
where
    T: DeserializeOwned,
{
    pub(super) fn new(client: &'a Client, table: &'a Table<T>, keys: Vec<Key>) -> Self {
        Self {
            client,
            table,
            keys,
            not_found: None,
            omit_missing: false,
        }
    }

    /// Replaces the error raised when some keys have no item.
    pub fn map_not_found(mut self, map: impl FnOnce(Error) -> Error + Send + 'a) -> Self {
        self.not_found = Some(Box::new(map));
        self
    }

    /// Leaves missing items out of the result instead of failing.
    pub fn omit_missing(mut self) -> Self {
        self.omit_missing = true;
        self
    }

    pub async fn send(self) -> Result<Vec<Tracked<T>>> {
        if self.keys.is_empty() {
            return Ok(Vec::new());
        }

        let definition = self.table.definition();
        let key_names = definition.key_attribute_names();
        let chunk_size = self
            .client
            .options()
            .batch_get_chunk_size
            .clamp(1, MAX_BATCH_GET_KEYS);

        let mut pending: VecDeque<Key> = VecDeque::new();
        for key in &self.keys {
            if !pending.contains(key) {
                pending.push_back(key.clone());
            }
        }

        let mut found: HashMap<String, Item> = HashMap::new();
        while !pending.is_empty() {
            let batch: Vec<Key> = pending
                .drain(..chunk_size.min(pending.len()))
                .collect();
            let requested = batch.len();
            debug!(
                table = %definition.name(),
                keys = requested,
                "Batch getting items"
            );

            let output = self
                .client
                .store()
                .batch_get_items(BatchGetInput {
                    table_name: definition.name().to_string(),
                    keys: batch,
                    consistent_read: true,
                })
                .await?;

            if output.unprocessed_keys.len() >= requested {
                warn!(
                    table = %definition.name(),
                    keys = output.unprocessed_keys.len(),
                    "Batch get made no progress"
                );
                return Err(Error::UnprocessedKeys {
                    keys: output.unprocessed_keys,
                });
            }

            for item in output.items {
                if let Ok(key) = Key::from_item(&key_names, &item) {
                    found.insert(key.to_string(), item);
                }
            }
            pending.extend(output.unprocessed_keys);
        }

        let missing: Vec<Key> = self
            .keys
            .iter()
            .filter(|key| !found.contains_key(&key.to_string()))
            .cloned()
            .collect();
        if !missing.is_empty() && !self.omit_missing {
            return Err(apply_override(
                Error::ItemNotFound { keys: missing },
                self.not_found,
            ));
        }

        self.keys
            .iter()
            .filter_map(|key| found.get(&key.to_string()))
            .map(|raw| self.client.record(definition, raw.clone()))
            .collect()
    }
}
