//! Bidirectional pointer consistency across the changes of one commit.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::warn;

use crate::item::{scalar_string, Item, Key};
use crate::schema::{Relationship, RelationshipKind, TableDefinition};

use super::plan::ItemChange;
use super::RelationshipViolation;

/// Renders a key as the pointer peers store: the partition key value, or
/// partition and sort key values joined by `separator`.
pub fn key_pointer(table: &TableDefinition, key: &Key, separator: &str) -> Option<String> {
    let partition = scalar_string(key.get(table.partition_key())?)?;
    match table.sort_key() {
        Some(sort_key) => {
            let sort = scalar_string(key.get(sort_key)?)?;
            Some(format!("{partition}{separator}{sort}"))
        }
        None => Some(partition),
    }
}

/// Reads the pointers an item holds in `attribute`.
fn pointers(kind: RelationshipKind, attribute: &str, item: Option<&Item>) -> BTreeSet<String> {
    let Some(value) = item.and_then(|item| item.get(attribute)) else {
        return BTreeSet::new();
    };
    match (kind.points_to_many(), value) {
        (true, Value::Array(values)) => values.iter().filter_map(scalar_string).collect(),
        (false, value) => scalar_string(value).into_iter().collect(),
        _ => BTreeSet::new(),
    }
}

/// Checks every relationship of every table touched by `changes`.
///
/// A pointer may only be added or removed when the peer item is part of the
/// same commit and its new value agrees: it points back when the pointer was
/// added and no longer points back when it was removed.
pub fn validate_relationships(changes: &[ItemChange]) -> Result<(), RelationshipViolation> {
    for change in changes {
        let Some(subject) = change.subject() else {
            continue;
        };
        for relationship in change.table.relationships() {
            if relationship.is_item_exempt(subject) {
                continue;
            }
            validate_edge(change, subject, relationship, changes)?;
        }
    }
    Ok(())
}

fn validate_edge(
    change: &ItemChange,
    subject: &Item,
    relationship: &Relationship,
    changes: &[ItemChange],
) -> Result<(), RelationshipViolation> {
    let violation = || {
        let item = Value::Object(subject.clone()).to_string();
        warn!(
            table = %change.table.name(),
            peer_table = %relationship.peer_table,
            kind = %relationship.kind,
            "Relationship violation"
        );
        RelationshipViolation {
            item,
            kind: relationship.kind,
            table: change.table.name().to_string(),
            peer_table: relationship.peer_table.clone(),
        }
    };

    let separator = relationship.composite_key_separator.as_str();
    let attribute = relationship.pointer_attribute.as_str();
    let existing = pointers(relationship.kind, attribute, change.old_item.as_ref());
    let latest = pointers(relationship.kind, attribute, change.new_item.as_ref());
    if existing == latest {
        return Ok(());
    }

    let own_pointer = key_pointer(&change.table, &change.key, separator).ok_or_else(violation)?;
    let removed = existing.difference(&latest).map(|p| (p, false));
    let added = latest.difference(&existing).map(|p| (p, true));

    for (pointer, was_added) in removed.chain(added) {
        let peer = changes.iter().find(|candidate| {
            candidate.table.name() == relationship.peer_table
                && key_pointer(&candidate.table, &candidate.key, separator).as_deref()
                    == Some(pointer.as_str())
        });
        let Some(peer) = peer else {
            return Err(violation());
        };

        if let Some(peer_subject) = peer.subject() {
            if relationship.is_peer_item_exempt(peer_subject) {
                continue;
            }
        }

        let points_back = pointers(
            relationship.kind.flip(),
            &relationship.peer_pointer_attribute,
            peer.new_item.as_ref(),
        )
        .contains(&own_pointer);
        if points_back != was_added {
            return Err(violation());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::change::{plan_changes, ItemTransition};
    use crate::schema::{AttributeType, ObjectShape, Schema};
    use serde_json::json;

    fn item(value: Value) -> Item {
        value.as_object().cloned().unwrap()
    }

    /// Users hold a list of post ids, posts hold their author's id, every
    /// user has at most one profile (keyed by user id and kind) and users and
    /// groups list each other.
    fn schema() -> Schema {
        let users = ObjectShape::new()
            .required("id", AttributeType::String)
            .required("postIds", AttributeType::list(AttributeType::String))
            .optional("profile", AttributeType::String)
            .optional("groupIds", AttributeType::list(AttributeType::String))
            .optional("bot", AttributeType::Boolean);
        let posts = ObjectShape::new()
            .required("id", AttributeType::String)
            .optional("authorId", AttributeType::String)
            .optional("imported", AttributeType::Boolean);
        let groups = ObjectShape::new()
            .required("id", AttributeType::String)
            .required("memberIds", AttributeType::list(AttributeType::String));
        let profiles = ObjectShape::new()
            .required("userId", AttributeType::String)
            .required("kind", AttributeType::String)
            .optional("owner", AttributeType::String);

        Schema::builder()
            .table(TableDefinition::builder("Users", users, "id").build().unwrap())
            .unwrap()
            .table(TableDefinition::builder("Posts", posts, "id").build().unwrap())
            .unwrap()
            .table(TableDefinition::builder("Groups", groups, "id").build().unwrap())
            .unwrap()
            .table(
                TableDefinition::builder("Profiles", profiles, "userId")
                    .sort_key("kind")
                    .build()
                    .unwrap(),
            )
            .unwrap()
            .relationship(
                "Users",
                Relationship::new(RelationshipKind::OneToMany, "postIds", "Posts", "authorId")
                    .item_exemption(|user| user.get("bot") == Some(&json!(true)))
                    .peer_item_exemption(|post| post.get("imported") == Some(&json!(true))),
            )
            .unwrap()
            .relationship(
                "Users",
                Relationship::new(RelationshipKind::ManyToMany, "groupIds", "Groups", "memberIds"),
            )
            .unwrap()
            .relationship(
                "Users",
                Relationship::new(RelationshipKind::OneToOne, "profile", "Profiles", "owner")
                    .composite_key_separator("#"),
            )
            .unwrap()
            .build()
    }

    fn transition(
        schema: &Schema,
        table: &str,
        version: Option<u64>,
        old: Option<Value>,
        new: Option<Value>,
    ) -> ItemTransition {
        ItemTransition {
            table: Arc::clone(schema.definition(table).unwrap()),
            version,
            old_item: old.map(item),
            new_item: new.map(item),
        }
    }

    fn validate(transitions: &[ItemTransition]) -> Result<(), RelationshipViolation> {
        validate_relationships(&plan_changes(transitions).unwrap())
    }

    #[test]
    fn test_key_pointer_joins_sort_key() {
        let schema = schema();
        let profiles = schema.definition("Profiles").unwrap();
        let key = Key::new().with("userId", "u1").with("kind", "public");
        assert_eq!(key_pointer(profiles, &key, "#"), Some("u1#public".to_string()));

        let users = schema.definition("Users").unwrap();
        assert_eq!(
            key_pointer(users, &Key::new().with("id", "u1"), "#"),
            Some("u1".to_string())
        );
    }

    #[test]
    fn test_both_sides_committed_together() {
        let schema = schema();
        let result = validate(&[
            transition(&schema, "Users", None, None, Some(json!({"id": "u1", "postIds": ["p1"]}))),
            transition(&schema, "Posts", None, None, Some(json!({"id": "p1", "authorId": "u1"}))),
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_peer_change_is_a_violation() {
        let schema = schema();
        let error = validate(&[transition(
            &schema,
            "Users",
            None,
            None,
            Some(json!({"id": "u1", "postIds": ["p1"]})),
        )])
        .unwrap_err();

        assert_eq!(error.kind, RelationshipKind::OneToMany);
        assert_eq!(error.table, "Users");
        assert_eq!(error.peer_table, "Posts");
    }

    #[test]
    fn test_peer_not_pointing_back_is_a_violation() {
        let schema = schema();
        let error = validate(&[
            transition(&schema, "Users", None, None, Some(json!({"id": "u1", "postIds": ["p1"]}))),
            transition(&schema, "Posts", None, None, Some(json!({"id": "p1", "authorId": "u2"}))),
        ])
        .unwrap_err();
        assert_eq!(error.table, "Users");
    }

    #[test]
    fn test_removed_pointer_requires_peer_to_let_go() {
        let schema = schema();
        let still_pointing = validate(&[
            transition(
                &schema,
                "Users",
                Some(0),
                Some(json!({"id": "u1", "postIds": ["p1"]})),
                Some(json!({"id": "u1", "postIds": []})),
            ),
            transition(
                &schema,
                "Posts",
                Some(0),
                Some(json!({"id": "p1", "authorId": "u1"})),
                Some(json!({"id": "p1", "authorId": "u1"})),
            ),
        ]);
        assert!(still_pointing.is_err());

        let released = validate(&[
            transition(
                &schema,
                "Users",
                Some(0),
                Some(json!({"id": "u1", "postIds": ["p1"]})),
                Some(json!({"id": "u1", "postIds": []})),
            ),
            transition(
                &schema,
                "Posts",
                Some(0),
                Some(json!({"id": "p1", "authorId": "u1"})),
                Some(json!({"id": "p1"})),
            ),
        ]);
        assert!(released.is_ok());
    }

    #[test]
    fn test_deleting_both_sides_is_consistent() {
        let schema = schema();
        let result = validate(&[
            transition(&schema, "Users", Some(1), Some(json!({"id": "u1", "postIds": ["p1"]})), None),
            transition(&schema, "Posts", Some(1), Some(json!({"id": "p1", "authorId": "u1"})), None),
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_unchanged_pointers_need_no_peer() {
        let schema = schema();
        let result = validate(&[transition(
            &schema,
            "Users",
            Some(3),
            Some(json!({"id": "u1", "postIds": ["p1"]})),
            Some(json!({"id": "u1", "postIds": ["p1"], "profile": null})),
        )]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_exempt_item_is_skipped() {
        let schema = schema();
        let result = validate(&[transition(
            &schema,
            "Users",
            None,
            None,
            Some(json!({"id": "bot", "postIds": ["p1"], "bot": true})),
        )]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_composite_key_pointer_one_to_one() {
        let schema = schema();
        let result = validate(&[
            transition(&schema, "Users", None, None, Some(json!({"id": "u1", "postIds": [], "profile": "u1#public"}))),
            transition(
                &schema,
                "Profiles",
                None,
                None,
                Some(json!({"userId": "u1", "kind": "public", "owner": "u1"})),
            ),
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_one_to_one_symmetry() {
        let schema = schema();
        let error = validate(&[transition(
            &schema,
            "Profiles",
            None,
            None,
            Some(json!({"userId": "u1", "kind": "public", "owner": "u1"})),
        )])
        .unwrap_err();
        assert_eq!(error.kind, RelationshipKind::OneToOne);
        assert_eq!(error.table, "Profiles");
        assert_eq!(error.peer_table, "Users");
    }

    #[test]
    fn test_many_to_many_needs_every_peer() {
        let schema = schema();
        let user = || {
            transition(
                &schema,
                "Users",
                Some(0),
                Some(json!({"id": "u1", "postIds": []})),
                Some(json!({"id": "u1", "postIds": [], "groupIds": ["g1", "g2"]})),
            )
        };
        let group = |id: &str| {
            transition(&schema, "Groups", None, None, Some(json!({"id": id, "memberIds": ["u1"]})))
        };

        assert!(validate(&[user(), group("g1"), group("g2")]).is_ok());

        let error = validate(&[user(), group("g1")]).unwrap_err();
        assert_eq!(error.kind, RelationshipKind::ManyToMany);
        assert_eq!(error.table, "Users");
        assert_eq!(error.peer_table, "Groups");
    }

    #[test]
    fn test_peer_exempt_item_is_skipped() {
        let schema = schema();
        let imported = || json!({"id": "p9", "authorId": "u1", "imported": true});

        // The exempt post may point at a user that does not list it.
        let alone = validate(&[transition(&schema, "Posts", None, None, Some(imported()))]);
        assert!(alone.is_ok());

        // A user adding the exempt post does not need it to point back.
        let adopted = validate(&[
            transition(
                &schema,
                "Users",
                Some(0),
                Some(json!({"id": "u2", "postIds": []})),
                Some(json!({"id": "u2", "postIds": ["p9"]})),
            ),
            transition(&schema, "Posts", None, None, Some(imported())),
        ]);
        assert!(adopted.is_ok());

        let native = validate(&[transition(
            &schema,
            "Posts",
            None,
            None,
            Some(json!({"id": "p9", "authorId": "u1"})),
        )]);
        assert!(native.is_err());
    }

    #[test]
    fn test_key_change_moves_one_to_one_pointer() {
        let schema = schema();
        let moved_user = || {
            transition(
                &schema,
                "Users",
                Some(2),
                Some(json!({"id": "u1", "postIds": [], "profile": "u1#public"})),
                Some(json!({"id": "u2", "postIds": [], "profile": "u1#public"})),
            )
        };

        let error = validate(&[moved_user()]).unwrap_err();
        assert_eq!(error.kind, RelationshipKind::OneToOne);
        assert_eq!(error.peer_table, "Profiles");

        let result = validate(&[
            moved_user(),
            transition(
                &schema,
                "Profiles",
                Some(0),
                Some(json!({"userId": "u1", "kind": "public", "owner": "u1"})),
                Some(json!({"userId": "u1", "kind": "public", "owner": "u2"})),
            ),
        ]);
        assert!(result.is_ok());
    }
}
