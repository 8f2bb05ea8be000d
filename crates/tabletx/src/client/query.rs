use std::collections::HashMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use tracing::debug;

use tabletx_core::expression::{
    compile, Condition, ExpressionInput, PartitionKeyCondition, SortKeyCondition,
};
use tabletx_core::pagination::{decode_resume_token, encode_resume_token, PageCollector};
use tabletx_core::schema::Queryable;
use tabletx_core::store::{QueryInput, ScanInput};
use tabletx_core::{Error, Item, Key, Result};

use super::{apply_override, Client, ErrorOverride};
use crate::tracking::Tracked;

/// Items read by a query or scan.
#[derive(Debug)]
pub struct ItemsPage<T> {
    pub items: Vec<Tracked<T>>,
    /// Present when a limit was given and more items may follow.
    pub resume_token: Option<String>,
}

/// A query by partition key. Created by [`Client::query_items`].
#[must_use = "requests do nothing until `send` is awaited"]
pub struct QueryItems<'a, T, I> {
    client: &'a Client,
    index: &'a I,
    partition_key: PartitionKeyCondition,
    sort_key: Option<SortKeyCondition>,
    filters: Vec<Condition>,
    limit: Option<usize>,
    resume_token: Option<String>,
    scan_index_forward: bool,
    invalid_resume_token: Option<ErrorOverride<'a>>,
    _item: PhantomData<fn() -> T>,
}

impl<'a, T, I> QueryItems<'a, T, I>
where
    T: DeserializeOwned,
    I: Queryable<T>,
{
    pub(super) fn new(
        client: &'a Client,
        index: &'a I,
        partition_key: PartitionKeyCondition,
    ) -> Self {
        Self {
            client,
            index,
            partition_key,
            sort_key: None,
            filters: Vec::new(),
            limit: None,
            resume_token: None,
            scan_index_forward: true,
            invalid_resume_token: None,
            _item: PhantomData,
        }
    }

    pub fn sort_key(mut self, condition: SortKeyCondition) -> Self {
        self.sort_key = Some(condition);
        self
    }

    /// Adds a filter. Multiple filters must all hold.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filters.push(condition);
        self
    }

    /// Returns at most `limit` items.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Continues from a token returned by a previous page.
    pub fn resume_token(mut self, token: impl Into<String>) -> Self {
        self.resume_token = Some(token.into());
        self
    }

    /// `false` reverses the sort key order.
    pub fn scan_index_forward(mut self, forward: bool) -> Self {
        self.scan_index_forward = forward;
        self
    }

    /// Replaces the error raised for a malformed resume token.
    pub fn map_invalid_resume_token(
        mut self,
        map: impl FnOnce(Error) -> Error + Send + 'a,
    ) -> Self {
        self.invalid_resume_token = Some(Box::new(map));
        self
    }

    pub async fn send(self) -> Result<ItemsPage<T>> {
        check_key_conditions::<T, I>(self.index, &self.partition_key, self.sort_key.as_ref())?;
        let start_key = decode_start_key::<T, I>(self.index, self.resume_token.as_deref())
            .map_err(|error| apply_override(error, self.invalid_resume_token))?;

        let expressions = compile(ExpressionInput {
            partition_key: Some(&self.partition_key),
            sort_key: self.sort_key.as_ref(),
            filters: &self.filters,
            ..Default::default()
        });

        let definition = self.index.definition();
        debug!(
            table = %definition.name(),
            index = ?self.index.index_name(),
            limit = ?self.limit,
            "Querying items"
        );

        let mut collector = PageCollector::new(self.limit, start_key);
        while collector.has_next() {
            let page = self
                .client
                .store()
                .query(QueryInput {
                    table_name: definition.name().to_string(),
                    index_name: self.index.index_name().map(str::to_string),
                    consistent_read: self.index.consistent_read(),
                    key_condition: expressions.key_condition.clone().unwrap_or_default(),
                    filter: expressions.filter.clone(),
                    attribute_names: expressions.attribute_names.clone(),
                    attribute_values: expressions.attribute_values.clone(),
                    exclusive_start_key: collector.exclusive_start_key(),
                    limit: collector.remaining(),
                    scan_index_forward: self.scan_index_forward,
                })
                .await?;
            collector.push(page);
        }

        finish(self.client, self.index, collector).await
    }
}

/// A scan of a table or index. Created by [`Client::scan_items`].
#[must_use = "requests do nothing until `send` is awaited"]
pub struct ScanItems<'a, T, I> {
    client: &'a Client,
    index: &'a I,
    filters: Vec<Condition>,
    limit: Option<usize>,
    resume_token: Option<String>,
    invalid_resume_token: Option<ErrorOverride<'a>>,
    _item: PhantomData<fn() -> T>,
}

impl<'a, T, I> ScanItems<'a, T, I>
where
    T: DeserializeOwned,
    I: Queryable<T>,
{
    pub(super) fn new(client: &'a Client, index: &'a I) -> Self {
        Self {
            client,
            index,
            filters: Vec::new(),
            limit: None,
            resume_token: None,
            invalid_resume_token: None,
            _item: PhantomData,
        }
    }

    /// Adds a filter. Multiple filters must all hold.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filters.push(condition);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn resume_token(mut self, token: impl Into<String>) -> Self {
        self.resume_token = Some(token.into());
        self
    }

    pub fn map_invalid_resume_token(
        mut self,
        map: impl FnOnce(Error) -> Error + Send + 'a,
    ) -> Self {
        self.invalid_resume_token = Some(Box::new(map));
        self
    }

    pub async fn send(self) -> Result<ItemsPage<T>> {
        let start_key = decode_start_key::<T, I>(self.index, self.resume_token.as_deref())
            .map_err(|error| apply_override(error, self.invalid_resume_token))?;

        let expressions = compile(ExpressionInput {
            filters: &self.filters,
            ..Default::default()
        });

        let definition = self.index.definition();
        debug!(
            table = %definition.name(),
            index = ?self.index.index_name(),
            limit = ?self.limit,
            "Scanning items"
        );

        let mut collector = PageCollector::new(self.limit, start_key);
        while collector.has_next() {
            let page = self
                .client
                .store()
                .scan(ScanInput {
                    table_name: definition.name().to_string(),
                    index_name: self.index.index_name().map(str::to_string),
                    consistent_read: self.index.consistent_read(),
                    filter: expressions.filter.clone(),
                    attribute_names: expressions.attribute_names.clone(),
                    attribute_values: expressions.attribute_values.clone(),
                    exclusive_start_key: collector.exclusive_start_key(),
                    limit: collector.remaining(),
                })
                .await?;
            collector.push(page);
        }

        finish(self.client, self.index, collector).await
    }
}

/// Rejects key conditions on attributes that are not the source's keys.
fn check_key_conditions<T, I: Queryable<T>>(
    index: &I,
    partition_key: &PartitionKeyCondition,
    sort_key: Option<&SortKeyCondition>,
) -> Result<()> {
    let invalid = |role, attribute: &str| {
        let target = match index.index_name() {
            Some(name) => format!("{}/{name}", index.definition().name()),
            None => index.definition().name().to_string(),
        };
        Error::InvalidKeyCondition {
            target,
            role,
            attribute: attribute.to_string(),
        }
    };

    if partition_key.attribute() != index.partition_key() {
        return Err(invalid("partition key", partition_key.attribute()));
    }
    if let Some(sort_key) = sort_key {
        if index.sort_key() != Some(sort_key.attribute()) {
            return Err(invalid("sort key", sort_key.attribute()));
        }
    }
    Ok(())
}

fn decode_start_key<T, I: Queryable<T>>(index: &I, token: Option<&str>) -> Result<Option<Key>> {
    token
        .map(|token| {
            decode_resume_token(
                token,
                &index.key_attribute_names(),
                index.definition().shape(),
            )
        })
        .transpose()
        .map_err(Error::from)
}

async fn finish<T, I>(client: &Client, index: &I, collector: PageCollector) -> Result<ItemsPage<T>>
where
    T: DeserializeOwned,
    I: Queryable<T>,
{
    let (raw_items, last_evaluated_key) = collector.finish();
    let items = resolve_items(client, index, raw_items).await?;
    Ok(ItemsPage {
        items,
        resume_token: last_evaluated_key.as_ref().map(encode_resume_token),
    })
}

enum Slot<T> {
    Ready(Tracked<T>),
    Pending(Key),
}

/// Records read items, completing ones an index projected only partially
/// with a batch read from the base table.
async fn resolve_items<T, I>(client: &Client, index: &I, raw_items: Vec<Item>) -> Result<Vec<Tracked<T>>>
where
    T: DeserializeOwned,
    I: Queryable<T>,
{
    let definition = index.definition();
    let key_names = definition.key_attribute_names();

    let mut slots = Vec::with_capacity(raw_items.len());
    let mut incomplete = Vec::new();
    for raw in raw_items {
        if index.projects_all_attributes() {
            slots.push(Slot::Ready(client.record(definition, raw)?));
            continue;
        }
        let key = Key::from_item(&key_names, &raw).ok();
        match (client.record(definition, raw), key) {
            (Ok(tracked), _) => slots.push(Slot::Ready(tracked)),
            (Err(error), Some(key)) if is_incomplete(&error) => {
                incomplete.push(key.clone());
                slots.push(Slot::Pending(key));
            }
            (Err(error), _) => return Err(error),
        }
    }

    if incomplete.is_empty() {
        return Ok(slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Ready(tracked) => Some(tracked),
                Slot::Pending(_) => None,
            })
            .collect());
    }

    debug!(
        table = %definition.name(),
        count = incomplete.len(),
        "Completing partially projected items"
    );
    let mut completed: HashMap<String, Tracked<T>> = client
        .get_items(index.table(), incomplete)
        .omit_missing()
        .send()
        .await?
        .into_iter()
        .filter_map(|tracked| {
            let key = Key::from_item(&key_names, tracked.metadata().prior_snapshot()?).ok()?;
            Some((key.to_string(), tracked))
        })
        .collect();

    Ok(slots
        .into_iter()
        .filter_map(|slot| match slot {
            Slot::Ready(tracked) => Some(tracked),
            Slot::Pending(key) => completed.remove(&key.to_string()),
        })
        .collect())
}

fn is_incomplete(error: &Error) -> bool {
    match error {
        Error::ItemWithoutVersion { .. } => true,
        Error::ShapeValidation(error) => error.is_missing(),
        _ => false,
    }
}
