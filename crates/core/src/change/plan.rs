use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::expression::{
    compile, compile_update, version_condition, Condition, ExpressionInput,
};
use crate::item::{Item, Key};
use crate::schema::TableDefinition;
use crate::store::{DeleteOperation, PutOperation, UpdateOperation, WriteOperation};

use super::ChangeError;

/// How one tracked item moves between its prior snapshot and its current
/// value in a commit.
#[derive(Debug, Clone)]
pub struct ItemTransition {
    pub table: Arc<TableDefinition>,
    /// The stored version, `None` for items never written.
    pub version: Option<u64>,
    /// The prior snapshot, `None` for newly created items.
    pub old_item: Option<Item>,
    /// The current value, `None` for items pending deletion.
    pub new_item: Option<Item>,
}

/// All that happens to one table key in a commit.
///
/// The old side comes from the item that used to live at this key, the new
/// side from the item that lives here after the commit. They are usually the
/// same tracked item, but a key change splits one item across two keys and
/// two items can meet on the same key.
#[derive(Debug, Clone)]
pub struct ItemChange {
    pub table: Arc<TableDefinition>,
    pub key: Key,
    pub old_item: Option<Item>,
    pub old_version: Option<u64>,
    pub old_source: Option<usize>,
    pub new_item: Option<Item>,
    pub new_source: Option<usize>,
}

impl ItemChange {
    fn new(table: &Arc<TableDefinition>, key: Key) -> Self {
        Self {
            table: Arc::clone(table),
            key,
            old_item: None,
            old_version: None,
            old_source: None,
            new_item: None,
            new_source: None,
        }
    }

    /// The item to judge exemptions and report violations with: the new
    /// value when there is one, otherwise the old one.
    pub fn subject(&self) -> Option<&Item> {
        self.new_item.as_ref().or(self.old_item.as_ref())
    }

    /// The version stored at this key once the commit succeeds, if an item
    /// remains.
    pub fn written_version(&self) -> Option<u64> {
        self.new_item.as_ref()?;
        Some(self.old_version.map_or(0, |v| v + 1))
    }

    /// The write that applies this change.
    pub fn write_operation(&self) -> Option<WriteOperation> {
        let table_name = self.table.name().to_string();
        let version_attribute = self.table.version_attribute();

        match (&self.old_item, &self.new_item, self.old_version) {
            (None, Some(new_item), _) => {
                let conditions = [Condition::not_exists(self.table.partition_key())];
                let expressions = compile(ExpressionInput {
                    conditions: &conditions,
                    ..Default::default()
                });
                Some(WriteOperation::Put(PutOperation {
                    table_name,
                    item: with_version(new_item, version_attribute, 0),
                    condition: expressions.condition,
                    attribute_names: expressions.attribute_names,
                    attribute_values: expressions.attribute_values,
                }))
            }
            (Some(_), None, Some(version)) => {
                let conditions = [version_condition(version_attribute, version)];
                let expressions = compile(ExpressionInput {
                    conditions: &conditions,
                    ..Default::default()
                });
                Some(WriteOperation::Delete(DeleteOperation {
                    table_name,
                    key: self.key.clone(),
                    condition: expressions.condition,
                    attribute_names: expressions.attribute_names,
                    attribute_values: expressions.attribute_values,
                }))
            }
            (Some(old_item), Some(new_item), Some(version)) if self.old_source == self.new_source => {
                let (set, remove) = diff(old_item, new_item, &self.table);
                let update = compile_update(&set, &remove, version_attribute, version);
                Some(WriteOperation::Update(UpdateOperation {
                    table_name,
                    key: self.key.clone(),
                    update: update.update,
                    condition: Some(update.condition),
                    attribute_names: Some(update.attribute_names),
                    attribute_values: Some(update.attribute_values),
                }))
            }
            (Some(_), Some(new_item), Some(version)) => {
                let conditions = [version_condition(version_attribute, version)];
                let expressions = compile(ExpressionInput {
                    conditions: &conditions,
                    ..Default::default()
                });
                Some(WriteOperation::Put(PutOperation {
                    table_name,
                    item: with_version(new_item, version_attribute, version + 1),
                    condition: expressions.condition,
                    attribute_names: expressions.attribute_names,
                    attribute_values: expressions.attribute_values,
                }))
            }
            _ => None,
        }
    }
}

fn with_version(item: &Item, version_attribute: &str, version: u64) -> Item {
    let mut item = item.clone();
    item.insert(version_attribute.to_string(), Value::from(version));
    item
}

/// Attributes to set (changed or added) and to remove (no longer present).
/// Key attributes never change within an update.
fn diff(old_item: &Item, new_item: &Item, table: &TableDefinition) -> (Vec<(String, Value)>, Vec<String>) {
    let set = new_item
        .iter()
        .filter(|(name, _)| !table.is_key_attribute(name))
        .filter(|(name, value)| old_item.get(name.as_str()) != Some(*value))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    let remove = old_item
        .keys()
        .filter(|name| !table.is_key_attribute(name) && !new_item.contains_key(name.as_str()))
        .cloned()
        .collect();
    (set, remove)
}

/// Splits item transitions into per-key changes.
///
/// An item whose key changed contributes the old side of one change and the
/// new side of another. Two items claiming the same side of the same key is
/// an error.
pub fn plan_changes(transitions: &[ItemTransition]) -> Result<Vec<ItemChange>, ChangeError> {
    let mut changes: Vec<ItemChange> = Vec::new();

    for (source, transition) in transitions.iter().enumerate() {
        let table = &transition.table;
        let key_names = table.key_attribute_names();

        if let Some(old_item) = &transition.old_item {
            let key = extract_key(table, &key_names, old_item)?;
            let change = change_for(&mut changes, table, key);
            if change.old_item.is_some() {
                return Err(ChangeError::DuplicateKey {
                    table: table.name().to_string(),
                    key: change.key.to_string(),
                });
            }
            change.old_item = Some(old_item.clone());
            change.old_version = transition.version;
            change.old_source = Some(source);
        }

        if let Some(new_item) = &transition.new_item {
            let key = extract_key(table, &key_names, new_item)?;
            let change = change_for(&mut changes, table, key);
            if change.new_item.is_some() {
                return Err(ChangeError::DuplicateKey {
                    table: table.name().to_string(),
                    key: change.key.to_string(),
                });
            }
            change.new_item = Some(new_item.clone());
            change.new_source = Some(source);
        }
    }

    trace!(changes = changes.len(), "Planned item changes");
    Ok(changes)
}

fn extract_key(table: &TableDefinition, key_names: &[String], item: &Item) -> Result<Key, ChangeError> {
    Key::from_item(key_names, item).map_err(|attribute| ChangeError::MissingKeyAttribute {
        table: table.name().to_string(),
        attribute,
    })
}

fn change_for<'a>(
    changes: &'a mut Vec<ItemChange>,
    table: &Arc<TableDefinition>,
    key: Key,
) -> &'a mut ItemChange {
    let position = changes
        .iter()
        .position(|c| c.table.name() == table.name() && c.key == key);
    match position {
        Some(i) => &mut changes[i],
        None => {
            changes.push(ItemChange::new(table, key));
            let last = changes.len() - 1;
            &mut changes[last]
        }
    }
}
