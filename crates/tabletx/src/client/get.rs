use serde::de::DeserializeOwned;
use tracing::debug;

use tabletx_core::schema::Table;
use tabletx_core::store::GetItemInput;
use tabletx_core::{Error, Key, Result};

use super::{apply_override, Client, ErrorOverride};
use crate::tracking::Tracked;

/// A point read of a single item. Created by [`Client::get_item`].
#[must_use = "requests do nothing until `send` is awaited"]
pub struct GetItem<'a, T> {
    client: &'a Client,
    table: &'a Table<T>,
    key: Key,
    not_found: Option<ErrorOverride<'a>>,
}

impl<'a, T> GetItem<'a, T>
where
    T: DeserializeOwned,
{
    pub(super) fn new(client: &'a Client, table: &'a Table<T>, key: Key) -> Self {
        Self {
            client,
            table,
            key,
            not_found: None,
        }
    }

    /// Replaces the error raised when no item has the key.
    pub fn map_not_found(mut self, map: impl FnOnce(Error) -> Error + Send + 'a) -> Self {
        self.not_found = Some(Box::new(map));
        self
    }

    /// Reads the item, failing when it does not exist.
    pub async fn send(self) -> Result<Tracked<T>> {
        let key = self.key.clone();
        let not_found = self.not_found;
        match Self::fetch(self.client, self.table, self.key).await? {
            Some(item) => Ok(item),
            None => Err(apply_override(
                Error::ItemNotFound { keys: vec![key] },
                not_found,
            )),
        }
    }

    /// Reads the item, returning `None` when it does not exist.
    pub async fn send_optional(self) -> Result<Option<Tracked<T>>> {
        Self::fetch(self.client, self.table, self.key).await
    }

    async fn fetch(client: &Client, table: &Table<T>, key: Key) -> Result<Option<Tracked<T>>> {
        let definition = table.definition();
        debug!(table = %definition.name(), key = %key, "Getting item");

        let output = client
            .store()
            .get_item(GetItemInput {
                table_name: definition.name().to_string(),
                key,
                consistent_read: true,
            })
            .await?;

        output.map(|raw| client.record(definition, raw)).transpose()
    }
}
