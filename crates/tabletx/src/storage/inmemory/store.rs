//! In-memory store implementation.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use tabletx_core::schema::{Projection, Queryable, SecondaryIndex, Table};
use tabletx_core::store::{
    BatchGetInput, BatchGetOutput, CancellationReason, GetItemInput, Page, QueryInput, Result,
    ScanInput, Store, StoreError, WriteOperation, CONDITIONAL_CHECK_FAILED, MAX_BATCH_GET_KEYS,
    MAX_TRANSACT_WRITE_ITEMS,
};
use tabletx_core::{Item, Key};

use super::expression::{apply_update, compare_values, evaluate, Aliases};

/// Key layout of a table or one of its indexes.
#[derive(Debug, Clone)]
struct KeySchema {
    partition_key: String,
    sort_key: Option<String>,
}

impl KeySchema {
    fn names(&self) -> Vec<String> {
        std::iter::once(self.partition_key.clone())
            .chain(self.sort_key.clone())
            .collect()
    }
}

#[derive(Debug, Clone)]
struct IndexState {
    keys: KeySchema,
    projection: Projection,
}

#[derive(Debug, Clone)]
struct TableState {
    keys: KeySchema,
    indexes: HashMap<String, IndexState>,
    /// Items by the canonical rendering of their key.
    items: HashMap<String, Item>,
}

impl TableState {
    fn key_of(&self, item: &Item) -> Result<Key> {
        Key::from_item(&self.keys.names(), item).map_err(|attribute| {
            StoreError::Validation(format!("item is missing key attribute \"{attribute}\""))
        })
    }

    fn check_key(&self, key: &Key) -> Result<()> {
        let expected = self.keys.names();
        if key.len() != expected.len() || expected.iter().any(|name| key.get(name).is_none()) {
            return Err(StoreError::Validation(format!(
                "key {key} does not match the table key schema"
            )));
        }
        Ok(())
    }
}

/// Calls made against an [`InMemoryStore`], by operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get_item: usize,
    pub batch_get_items: usize,
    pub query: usize,
    pub scan: usize,
    pub transact_write: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.get_item + self.batch_get_items + self.query + self.scan + self.transact_write
    }
}

#[derive(Debug, Default)]
struct Counters {
    get_item: AtomicUsize,
    batch_get_items: AtomicUsize,
    query: AtomicUsize,
    scan: AtomicUsize,
    transact_write: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, AtomicOrdering::Relaxed);
    }

    fn snapshot(&self) -> CallCounts {
        CallCounts {
            get_item: self.get_item.load(AtomicOrdering::Relaxed),
            batch_get_items: self.batch_get_items.load(AtomicOrdering::Relaxed),
            query: self.query.load(AtomicOrdering::Relaxed),
            scan: self.scan.load(AtomicOrdering::Relaxed),
            transact_write: self.transact_write.load(AtomicOrdering::Relaxed),
        }
    }
}

/// Builder for [`InMemoryStore`].
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    tables: HashMap<String, TableState>,
    page_size: Option<usize>,
    batch_get_limit: Option<usize>,
}

impl InMemoryStoreBuilder {
    /// Creates the table described by `table`.
    pub fn table<T>(mut self, table: &Table<T>) -> Self {
        let definition = table.definition();
        self.tables.insert(
            definition.name().to_string(),
            TableState {
                keys: KeySchema {
                    partition_key: definition.partition_key().to_string(),
                    sort_key: definition.sort_key().map(str::to_string),
                },
                indexes: HashMap::new(),
                items: HashMap::new(),
            },
        );
        self
    }

    /// Adds a secondary index. Its table is created when missing.
    pub fn index<T>(mut self, index: &SecondaryIndex<T>) -> Self {
        if !self.tables.contains_key(index.table().name()) {
            self = self.table(index.table());
        }
        if let Some(state) = self.tables.get_mut(index.table().name()) {
            state.indexes.insert(
                index.name().to_string(),
                IndexState {
                    keys: KeySchema {
                        partition_key: index.partition_key().to_string(),
                        sort_key: index.sort_key().map(str::to_string),
                    },
                    projection: index.projected().clone(),
                },
            );
        }
        self
    }

    /// Caps how many items a single query or scan evaluates, so callers
    /// have to follow pages.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Processes at most `limit` keys per batch get and returns the rest as
    /// unprocessed.
    pub fn batch_get_limit(mut self, limit: usize) -> Self {
        self.batch_get_limit = Some(limit);
        self
    }

    pub fn build(self) -> InMemoryStore {
        InMemoryStore {
            tables: Arc::new(RwLock::new(self.tables)),
            page_size: self.page_size,
            batch_get_limit: self.batch_get_limit,
            counters: Arc::new(Counters::default()),
        }
    }
}

/// In-memory [`Store`] with the same conditional and transactional
/// semantics as the remote one.
///
/// Tables live in a `HashMap` behind an `Arc<RwLock<_>>`; clones share data.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, TableState>>>,
    page_size: Option<usize>,
    batch_get_limit: Option<usize>,
    counters: Arc<Counters>,
}

impl InMemoryStore {
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Writes a raw item, bypassing conditions and versions.
    pub async fn put_raw(&self, table_name: &str, item: Item) -> Result<()> {
        let mut tables = self.tables.write().await;
        let table = table_mut(&mut tables, table_name)?;
        let key = table.key_of(&item)?;
        table.items.insert(key.to_string(), item);
        Ok(())
    }

    /// Reads a raw item, including its version attribute.
    pub async fn get_raw(&self, table_name: &str, key: &Key) -> Option<Item> {
        let tables = self.tables.read().await;
        tables.get(table_name)?.items.get(&key.to_string()).cloned()
    }

    /// Number of items stored in a table.
    pub async fn len(&self, table_name: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table_name).map_or(0, |table| table.items.len())
    }

    pub fn calls(&self) -> CallCounts {
        self.counters.snapshot()
    }
}

fn table_ref<'a>(tables: &'a HashMap<String, TableState>, name: &str) -> Result<&'a TableState> {
    tables
        .get(name)
        .ok_or_else(|| StoreError::ResourceNotFound(format!("table {name}")))
}

fn table_mut<'a>(
    tables: &'a mut HashMap<String, TableState>,
    name: &str,
) -> Result<&'a mut TableState> {
    tables
        .get_mut(name)
        .ok_or_else(|| StoreError::ResourceNotFound(format!("table {name}")))
}

// ============================================================================
// Reads
// ============================================================================

/// Where a query or scan reads from.
struct Source<'a> {
    table: &'a TableState,
    index: Option<&'a IndexState>,
}

impl<'a> Source<'a> {
    fn resolve(tables: &'a HashMap<String, TableState>, table_name: &str, index_name: Option<&str>) -> Result<Self> {
        let table = table_ref(tables, table_name)?;
        let index = index_name
            .map(|name| {
                table.indexes.get(name).ok_or_else(|| {
                    StoreError::ResourceNotFound(format!("index {name} on table {table_name}"))
                })
            })
            .transpose()?;
        Ok(Self { table, index })
    }

    /// Attributes identifying an entry: index keys first, then table keys.
    fn position_attributes(&self) -> Vec<String> {
        let mut names = self.index.map(|index| index.keys.names()).unwrap_or_default();
        for name in self.table.keys.names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Entries in key order. Items lacking an index key are not indexed.
    fn entries(&self) -> Vec<&'a Item> {
        let attributes = self.position_attributes();
        let mut entries: Vec<&Item> = self
            .table
            .items
            .values()
            .filter(|item| match self.index {
                Some(index) => index.keys.names().iter().all(|name| item.contains_key(name)),
                None => true,
            })
            .collect();
        entries.sort_by(|a, b| compare_positions(&attributes, a, b));
        entries
    }

    fn project(&self, item: &Item) -> Item {
        let Some(index) = self.index else {
            return item.clone();
        };
        let keep: Vec<String> = match &index.projection {
            Projection::All => return item.clone(),
            Projection::KeysOnly => self.position_attributes(),
            Projection::Include(names) => {
                let mut keep = self.position_attributes();
                keep.extend(names.iter().cloned());
                keep
            }
        };
        item.iter()
            .filter(|(name, _)| keep.contains(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

fn compare_positions(attributes: &[String], a: &Item, b: &Item) -> Ordering {
    for name in attributes {
        let ordering = match (a.get(name), b.get(name)) {
            (Some(a), Some(b)) => compare_values(a, b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

struct PageRequest<'a> {
    key_condition: Option<&'a str>,
    filter: Option<&'a str>,
    aliases: Aliases<'a>,
    exclusive_start_key: Option<&'a Key>,
    limit: Option<usize>,
    forward: bool,
}

fn read_page(source: &Source<'_>, request: PageRequest<'_>, page_size: Option<usize>) -> Result<Page> {
    let attributes = source.position_attributes();

    let mut candidates = Vec::new();
    for item in source.entries() {
        let matches = match request.key_condition {
            Some(expression) => evaluate(expression, request.aliases, Some(item))?,
            None => true,
        };
        if matches {
            candidates.push(item);
        }
    }
    if !request.forward {
        candidates.reverse();
    }

    if let Some(start) = request.exclusive_start_key {
        let start = start.to_item();
        candidates.retain(|item| {
            let ordering = compare_positions(&attributes, item, &start);
            if request.forward {
                ordering == Ordering::Greater
            } else {
                ordering == Ordering::Less
            }
        });
    }

    let budget = match (request.limit, page_size) {
        (Some(limit), Some(size)) => limit.min(size),
        (Some(limit), None) => limit,
        (None, Some(size)) => size,
        (None, None) => usize::MAX,
    };
    let evaluated = &candidates[..budget.min(candidates.len())];

    let mut items = Vec::new();
    for &item in evaluated {
        let keep = match request.filter {
            Some(expression) => evaluate(expression, request.aliases, Some(item))?,
            None => true,
        };
        if keep {
            items.push(source.project(item));
        }
    }

    let last_evaluated_key = match evaluated.last() {
        Some(last) if evaluated.len() < candidates.len() => {
            Some(Key::from_item(&attributes, last).map_err(|attribute| {
                StoreError::Conversion(format!("entry is missing key attribute \"{attribute}\""))
            })?)
        }
        _ => None,
    };

    Ok(Page {
        items,
        last_evaluated_key,
    })
}

// ============================================================================
// Transactions
// ============================================================================

fn operation_key(table: &TableState, operation: &WriteOperation) -> Result<Key> {
    match operation {
        WriteOperation::Put(put) => table.key_of(&put.item),
        WriteOperation::Update(update) => {
            table.check_key(&update.key)?;
            Ok(update.key.clone())
        }
        WriteOperation::Delete(delete) => {
            table.check_key(&delete.key)?;
            Ok(delete.key.clone())
        }
    }
}

fn operation_condition(operation: &WriteOperation) -> (Option<&str>, Aliases<'_>) {
    match operation {
        WriteOperation::Put(op) => (
            op.condition.as_deref(),
            Aliases {
                names: op.attribute_names.as_ref(),
                values: op.attribute_values.as_ref(),
            },
        ),
        WriteOperation::Update(op) => (
            op.condition.as_deref(),
            Aliases {
                names: op.attribute_names.as_ref(),
                values: op.attribute_values.as_ref(),
            },
        ),
        WriteOperation::Delete(op) => (
            op.condition.as_deref(),
            Aliases {
                names: op.attribute_names.as_ref(),
                values: op.attribute_values.as_ref(),
            },
        ),
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_item(&self, input: GetItemInput) -> Result<Option<Item>> {
        Counters::bump(&self.counters.get_item);
        let tables = self.tables.read().await;
        let table = table_ref(&tables, &input.table_name)?;
        table.check_key(&input.key)?;
        Ok(table.items.get(&input.key.to_string()).cloned())
    }

    async fn batch_get_items(&self, input: BatchGetInput) -> Result<BatchGetOutput> {
        Counters::bump(&self.counters.batch_get_items);
        if input.keys.len() > MAX_BATCH_GET_KEYS {
            return Err(StoreError::Validation(format!(
                "too many keys in batch get: {} (max {MAX_BATCH_GET_KEYS})",
                input.keys.len()
            )));
        }
        let mut seen = HashSet::new();
        if !input.keys.iter().all(|key| seen.insert(key.to_string())) {
            return Err(StoreError::Validation(
                "batch get contains duplicate keys".to_string(),
            ));
        }

        let tables = self.tables.read().await;
        let table = table_ref(&tables, &input.table_name)?;

        let processed = self.batch_get_limit.unwrap_or(usize::MAX).min(input.keys.len());
        let mut keys = input.keys;
        let unprocessed_keys = keys.split_off(processed);

        let mut items = Vec::new();
        for key in &keys {
            table.check_key(key)?;
            if let Some(item) = table.items.get(&key.to_string()) {
                items.push(item.clone());
            }
        }
        Ok(BatchGetOutput {
            items,
            unprocessed_keys,
        })
    }

    async fn query(&self, input: QueryInput) -> Result<Page> {
        Counters::bump(&self.counters.query);
        let tables = self.tables.read().await;
        let source = Source::resolve(&tables, &input.table_name, input.index_name.as_deref())?;
        read_page(
            &source,
            PageRequest {
                key_condition: Some(&input.key_condition),
                filter: input.filter.as_deref(),
                aliases: Aliases {
                    names: input.attribute_names.as_ref(),
                    values: input.attribute_values.as_ref(),
                },
                exclusive_start_key: input.exclusive_start_key.as_ref(),
                limit: input.limit,
                forward: input.scan_index_forward,
            },
            self.page_size,
        )
    }

    async fn scan(&self, input: ScanInput) -> Result<Page> {
        Counters::bump(&self.counters.scan);
        let tables = self.tables.read().await;
        let source = Source::resolve(&tables, &input.table_name, input.index_name.as_deref())?;
        read_page(
            &source,
            PageRequest {
                key_condition: None,
                filter: input.filter.as_deref(),
                aliases: Aliases {
                    names: input.attribute_names.as_ref(),
                    values: input.attribute_values.as_ref(),
                },
                exclusive_start_key: input.exclusive_start_key.as_ref(),
                limit: input.limit,
                forward: true,
            },
            self.page_size,
        )
    }

    async fn transact_write(&self, operations: Vec<WriteOperation>) -> Result<()> {
        Counters::bump(&self.counters.transact_write);
        if operations.is_empty() || operations.len() > MAX_TRANSACT_WRITE_ITEMS {
            return Err(StoreError::Validation(format!(
                "transactions take 1 to {MAX_TRANSACT_WRITE_ITEMS} operations, got {}",
                operations.len()
            )));
        }

        let mut tables = self.tables.write().await;

        let mut targets = Vec::with_capacity(operations.len());
        let mut seen = HashSet::new();
        for operation in &operations {
            let table = table_ref(&tables, operation.table_name())?;
            let key = operation_key(table, operation)?;
            if !seen.insert((operation.table_name().to_string(), key.to_string())) {
                return Err(StoreError::Validation(format!(
                    "transaction writes {} {key} more than once",
                    operation.table_name()
                )));
            }
            targets.push(key.to_string());
        }

        let mut reasons = Vec::with_capacity(operations.len());
        for (operation, target) in operations.iter().zip(&targets) {
            let table = table_ref(&tables, operation.table_name())?;
            let (condition, aliases) = operation_condition(operation);
            let passed = match condition {
                Some(expression) => evaluate(expression, aliases, table.items.get(target))?,
                None => true,
            };
            reasons.push(if passed {
                CancellationReason::new("None")
            } else {
                CancellationReason::new(CONDITIONAL_CHECK_FAILED)
                    .with_message("The conditional request failed")
            });
        }
        if reasons.iter().any(CancellationReason::is_conditional_check_failure) {
            debug!(operations = operations.len(), "Transaction cancelled");
            return Err(StoreError::TransactionCanceled { reasons });
        }

        // Updates are applied to copies first so a malformed update leaves
        // every table untouched.
        let mut writes: Vec<(String, String, Option<Item>)> = Vec::with_capacity(operations.len());
        for (operation, target) in operations.into_iter().zip(targets) {
            let table_name = operation.table_name().to_string();
            let table = table_ref(&tables, &table_name)?;
            let written = match operation {
                WriteOperation::Put(put) => Some(put.item),
                WriteOperation::Delete(_) => None,
                WriteOperation::Update(update) => {
                    let mut item = table
                        .items
                        .get(&target)
                        .cloned()
                        .unwrap_or_else(|| update.key.to_item());
                    apply_update(
                        &update.update,
                        Aliases {
                            names: update.attribute_names.as_ref(),
                            values: update.attribute_values.as_ref(),
                        },
                        &mut item,
                    )?;
                    Some(item)
                }
            };
            writes.push((table_name, target, written));
        }

        let count = writes.len();
        for (table_name, target, written) in writes {
            let table = table_mut(&mut tables, &table_name)?;
            match written {
                Some(item) => {
                    table.items.insert(target, item);
                }
                None => {
                    table.items.remove(&target);
                }
            }
        }
        debug!(operations = count, "Transaction committed");
        Ok(())
    }
}
