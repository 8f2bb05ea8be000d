//! Relationship declarations between tables.

use std::fmt;
use std::sync::Arc;

use crate::item::Item;

/// Separator joining partition and sort key values in key pointers.
pub const DEFAULT_COMPOSITE_KEY_SEPARATOR: &str = ".";

/// The cardinality of a relationship, read from the declaring table's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    OneToOne,
    /// Each item of this table points to any number of peer items.
    OneToMany,
    /// Each item of this table points to a single peer item.
    ManyToOne,
    ManyToMany,
}

impl RelationshipKind {
    /// The same relationship seen from the peer table.
    pub fn flip(self) -> Self {
        match self {
            Self::OneToMany => Self::ManyToOne,
            Self::ManyToOne => Self::OneToMany,
            other => other,
        }
    }

    /// Returns true when this side's pointer attribute holds a list.
    pub fn points_to_many(self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneToOne => "ONE_TO_ONE",
            Self::OneToMany => "ONE_TO_MANY",
            Self::ManyToOne => "MANY_TO_ONE",
            Self::ManyToMany => "MANY_TO_MANY",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicate exempting an item from a relationship.
pub type Exemption = Arc<dyn Fn(&Item) -> bool + Send + Sync>;

/// A relationship edge declared on a table.
///
/// Every edge has a mirrored edge on the peer table with the flipped kind,
/// swapped pointer attributes and swapped exemptions.
#[derive(Clone)]
pub struct Relationship {
    pub kind: RelationshipKind,
    /// Attribute on this table holding pointers to peer items.
    pub pointer_attribute: String,
    pub peer_table: String,
    /// Attribute on the peer table holding pointers back to this table.
    pub peer_pointer_attribute: String,
    pub composite_key_separator: String,
    pub item_exemption: Option<Exemption>,
    pub peer_item_exemption: Option<Exemption>,
}

impl Relationship {
    pub fn new(
        kind: RelationshipKind,
        pointer_attribute: impl Into<String>,
        peer_table: impl Into<String>,
        peer_pointer_attribute: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            pointer_attribute: pointer_attribute.into(),
            peer_table: peer_table.into(),
            peer_pointer_attribute: peer_pointer_attribute.into(),
            composite_key_separator: DEFAULT_COMPOSITE_KEY_SEPARATOR.to_string(),
            item_exemption: None,
            peer_item_exemption: None,
        }
    }

    pub fn composite_key_separator(mut self, separator: impl Into<String>) -> Self {
        self.composite_key_separator = separator.into();
        self
    }

    /// Exempts items of this table for which the predicate holds.
    pub fn item_exemption(mut self, predicate: impl Fn(&Item) -> bool + Send + Sync + 'static) -> Self {
        self.item_exemption = Some(Arc::new(predicate));
        self
    }

    /// Exempts peer items for which the predicate holds.
    pub fn peer_item_exemption(
        mut self,
        predicate: impl Fn(&Item) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.peer_item_exemption = Some(Arc::new(predicate));
        self
    }

    /// The mirrored edge to register on the peer table.
    pub fn flipped(&self, table: &str) -> Self {
        Self {
            kind: self.kind.flip(),
            pointer_attribute: self.peer_pointer_attribute.clone(),
            peer_table: table.to_string(),
            peer_pointer_attribute: self.pointer_attribute.clone(),
            composite_key_separator: self.composite_key_separator.clone(),
            item_exemption: self.peer_item_exemption.clone(),
            peer_item_exemption: self.item_exemption.clone(),
        }
    }

    /// Two edges are the same when they leave through the same pointer
    /// attribute towards the same peer table.
    pub fn same_edge(&self, other: &Relationship) -> bool {
        self.peer_table == other.peer_table && self.pointer_attribute == other.pointer_attribute
    }

    pub fn is_item_exempt(&self, item: &Item) -> bool {
        self.item_exemption.as_ref().is_some_and(|exempt| exempt(item))
    }

    pub fn is_peer_item_exempt(&self, item: &Item) -> bool {
        self.peer_item_exemption
            .as_ref()
            .is_some_and(|exempt| exempt(item))
    }
}

impl fmt::Debug for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relationship")
            .field("kind", &self.kind)
            .field("pointer_attribute", &self.pointer_attribute)
            .field("peer_table", &self.peer_table)
            .field("peer_pointer_attribute", &self.peer_pointer_attribute)
            .field("composite_key_separator", &self.composite_key_separator)
            .field("item_exemption", &self.item_exemption.is_some())
            .field("peer_item_exemption", &self.peer_item_exemption.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flip_kind() {
        assert_eq!(RelationshipKind::OneToMany.flip(), RelationshipKind::ManyToOne);
        assert_eq!(RelationshipKind::ManyToOne.flip(), RelationshipKind::OneToMany);
        assert_eq!(RelationshipKind::OneToOne.flip(), RelationshipKind::OneToOne);
        assert_eq!(RelationshipKind::ManyToMany.flip(), RelationshipKind::ManyToMany);
    }

    #[test]
    fn test_flipped_swaps_sides() {
        let edge = Relationship::new(RelationshipKind::OneToMany, "postIds", "Posts", "authorId")
            .composite_key_separator("#")
            .item_exemption(|item| item.contains_key("archived"));
        let mirror = edge.flipped("Authors");

        assert_eq!(mirror.kind, RelationshipKind::ManyToOne);
        assert_eq!(mirror.pointer_attribute, "authorId");
        assert_eq!(mirror.peer_table, "Authors");
        assert_eq!(mirror.peer_pointer_attribute, "postIds");
        assert_eq!(mirror.composite_key_separator, "#");
        assert!(mirror.item_exemption.is_none());
        assert!(mirror.peer_item_exemption.is_some());
    }

    #[test]
    fn test_exemptions() {
        let edge = Relationship::new(RelationshipKind::OneToOne, "a", "B", "b")
            .item_exemption(|item| item.get("skip") == Some(&json!(true)));
        let exempt = json!({"skip": true}).as_object().cloned().unwrap();
        let regular = json!({"skip": false}).as_object().cloned().unwrap();

        assert!(edge.is_item_exempt(&exempt));
        assert!(!edge.is_item_exempt(&regular));
        assert!(!edge.is_peer_item_exempt(&exempt));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(RelationshipKind::ManyToMany.to_string(), "MANY_TO_MANY");
    }
}
