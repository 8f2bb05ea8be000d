use std::fmt;
use std::sync::Arc;

use super::table::{Table, TableDefinition};

/// Which attributes a secondary index copies from the base table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    KeysOnly,
    /// Keys plus the named attributes.
    Include(Vec<String>),
}

/// A source that can be queried or scanned: a base table or one of its
/// secondary indexes.
pub trait Queryable<T> {
    fn table(&self) -> &Table<T>;

    /// `None` for the base table.
    fn index_name(&self) -> Option<&str>;

    fn partition_key(&self) -> &str;

    fn sort_key(&self) -> Option<&str>;

    /// Whether items read through this source carry every attribute,
    /// including the version.
    fn projects_all_attributes(&self) -> bool;

    /// Reads against base tables are strongly consistent; index reads are
    /// eventually consistent.
    fn consistent_read(&self) -> bool {
        self.index_name().is_none()
    }

    fn definition<'a>(&'a self) -> &'a Arc<TableDefinition>
    where
        T: 'a,
    {
        self.table().definition()
    }

    /// The attributes forming a last-evaluated key for this source: the
    /// source's own keys followed by the table's keys, without duplicates.
    fn key_attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::iter::once(self.partition_key().to_string())
            .chain(self.sort_key().map(str::to_string))
            .collect();
        for name in self.definition().key_attribute_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

impl<T> Queryable<T> for Table<T> {
    fn table(&self) -> &Table<T> {
        self
    }

    fn index_name(&self) -> Option<&str> {
        None
    }

    fn partition_key(&self) -> &str {
        self.definition().partition_key()
    }

    fn sort_key(&self) -> Option<&str> {
        self.definition().sort_key()
    }

    fn projects_all_attributes(&self) -> bool {
        true
    }
}

/// A global secondary index over a table.
pub struct SecondaryIndex<T> {
    table: Table<T>,
    name: String,
    partition_key: String,
    sort_key: Option<String>,
    projection: Projection,
}

impl<T> SecondaryIndex<T> {
    /// Declares an index projecting all attributes.
    pub fn new(table: &Table<T>, name: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            table: table.clone(),
            name: name.into(),
            partition_key: partition_key.into(),
            sort_key: None,
            projection: Projection::All,
        }
    }

    pub fn sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn projected(&self) -> &Projection {
        &self.projection
    }
}

impl<T> Clone for SecondaryIndex<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            name: self.name.clone(),
            partition_key: self.partition_key.clone(),
            sort_key: self.sort_key.clone(),
            projection: self.projection.clone(),
        }
    }
}

impl<T> fmt::Debug for SecondaryIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondaryIndex")
            .field("table", &self.table)
            .field("name", &self.name)
            .field("partition_key", &self.partition_key)
            .field("sort_key", &self.sort_key)
            .field("projection", &self.projection)
            .finish()
    }
}

impl<T> Queryable<T> for SecondaryIndex<T> {
    fn table(&self) -> &Table<T> {
        &self.table
    }

    fn index_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn partition_key(&self) -> &str {
        &self.partition_key
    }

    fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    fn projects_all_attributes(&self) -> bool {
        matches!(self.projection, Projection::All)
    }
}
