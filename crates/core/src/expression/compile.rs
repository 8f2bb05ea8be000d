use std::collections::BTreeMap;

use serde_json::Value;

use super::builder::ExpressionBuilder;
use super::condition::{Condition, PartitionKeyCondition, SortKeyCondition};

/// Conditions to compile into a single request's expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionInput<'a> {
    pub partition_key: Option<&'a PartitionKeyCondition>,
    pub sort_key: Option<&'a SortKeyCondition>,
    pub filters: &'a [Condition],
    pub conditions: &'a [Condition],
}

/// Compiled expression strings sharing one set of alias maps.
///
/// Expressions and maps are `None` when there was nothing to compile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expressions {
    pub key_condition: Option<String>,
    pub filter: Option<String>,
    pub condition: Option<String>,
    pub attribute_names: Option<BTreeMap<String, String>>,
    pub attribute_values: Option<BTreeMap<String, Value>>,
}

/// Compiles key, filter and condition-check conditions.
///
/// Key conditions (partition key, then sort key) are joined with `AND`, as
/// are multiple filters and multiple condition checks.
pub fn compile(input: ExpressionInput<'_>) -> Expressions {
    let mut builder = ExpressionBuilder::new();

    let key_conditions: Vec<&Condition> = input
        .partition_key
        .map(PartitionKeyCondition::condition)
        .into_iter()
        .chain(input.sort_key.map(SortKeyCondition::condition))
        .collect();

    let key_condition = join_all(&key_conditions, &mut builder);
    let filter = join_all(&input.filters.iter().collect::<Vec<_>>(), &mut builder);
    let condition = join_all(&input.conditions.iter().collect::<Vec<_>>(), &mut builder);

    let (attribute_names, attribute_values) = builder.into_maps();
    Expressions {
        key_condition,
        filter,
        condition,
        attribute_names,
        attribute_values,
    }
}

fn join_all(conditions: &[&Condition], builder: &mut ExpressionBuilder) -> Option<String> {
    if conditions.is_empty() {
        return None;
    }
    let conjunction = conditions.len() > 1;
    let parts: Vec<String> = conditions
        .iter()
        .map(|c| compile_nested(c, builder, conjunction))
        .collect();
    Some(parts.join(" AND "))
}

/// Compiles one condition, registering its names and values with `builder`.
pub fn compile_condition(condition: &Condition, builder: &mut ExpressionBuilder) -> String {
    match condition {
        Condition::Compare {
            attribute,
            comparator,
            value,
        } => {
            let name = builder.add_name(attribute);
            let value = builder.add_value(value);
            format!("{name} {comparator} {value}")
        }
        Condition::BeginsWith { attribute, prefix } => {
            let name = builder.add_name(attribute);
            let value = builder.add_value(prefix);
            format!("begins_with({name}, {value})")
        }
        Condition::Contains { attribute, operand } => {
            let name = builder.add_name(attribute);
            let value = builder.add_value(operand);
            format!("contains({name}, {value})")
        }
        Condition::Between {
            attribute,
            low,
            high,
        } => {
            let name = builder.add_name(attribute);
            let low = builder.add_value(low);
            let high = builder.add_value(high);
            format!("{name} BETWEEN {low} AND {high}")
        }
        Condition::In { attribute, values } => {
            let name = builder.add_name(attribute);
            let values: Vec<String> = values.iter().map(|v| builder.add_value(v)).collect();
            format!("{name} IN ({})", values.join(", "))
        }
        Condition::Exists { attribute } => {
            format!("attribute_exists({})", builder.add_name(attribute))
        }
        Condition::NotExists { attribute } => {
            format!("attribute_not_exists({})", builder.add_name(attribute))
        }
        Condition::And(left, right) => {
            let left = compile_nested(left, builder, true);
            let right = compile_nested(right, builder, true);
            format!("{left} AND {right}")
        }
        Condition::Or(left, right) => {
            let left = compile_condition(left, builder);
            let right = compile_condition(right, builder);
            format!("{left} OR {right}")
        }
        Condition::Group(inner) => format!("({})", compile_condition(inner, builder)),
    }
}

// A disjunction under a conjunction keeps its tree meaning only in parentheses.
fn compile_nested(condition: &Condition, builder: &mut ExpressionBuilder, conjunction: bool) -> String {
    let compiled = compile_condition(condition, builder);
    if conjunction && matches!(condition, Condition::Or(..)) {
        format!("({compiled})")
    } else {
        compiled
    }
}

// ============================================================================
// Version-guarded writes
// ============================================================================

/// A compiled update: `SET`/`REMOVE` clauses plus the optimistic-lock
/// condition.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateExpression {
    pub update: String,
    pub condition: String,
    pub attribute_names: BTreeMap<String, String>,
    pub attribute_values: BTreeMap<String, Value>,
}

/// Compiles an update setting `set`, removing `remove` and bumping the
/// version from `current_version` to `current_version + 1`, guarded on the
/// stored version still being `current_version`.
pub fn compile_update(
    set: &[(String, Value)],
    remove: &[String],
    version_attribute: &str,
    current_version: u64,
) -> UpdateExpression {
    let mut builder = ExpressionBuilder::new();

    let mut assignments: Vec<String> = set
        .iter()
        .map(|(name, value)| {
            let name = builder.add_name(name);
            let value = builder.add_value(value);
            format!("{name} = {value}")
        })
        .collect();
    let version_name = builder.add_name(version_attribute);
    let next_version = builder.add_value(&Value::from(current_version + 1));
    assignments.push(format!("{version_name} = {next_version}"));

    let mut update = format!("SET {}", assignments.join(", "));
    if !remove.is_empty() {
        let removed: Vec<String> = remove.iter().map(|name| builder.add_name(name)).collect();
        update.push_str(&format!(" REMOVE {}", removed.join(", ")));
    }

    let condition = compile_condition(
        &version_condition(version_attribute, current_version),
        &mut builder,
    );

    UpdateExpression {
        update,
        condition,
        attribute_names: builder.attribute_names().clone(),
        attribute_values: builder.attribute_values().clone(),
    }
}

/// The optimistic-lock guard: the item exists and still has `version`.
pub fn version_condition(version_attribute: &str, version: u64) -> Condition {
    Condition::exists(version_attribute).and(Condition::eq(version_attribute, version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compiled(condition: Condition) -> (String, ExpressionBuilder) {
        let mut builder = ExpressionBuilder::new();
        let expression = compile_condition(&condition, &mut builder);
        (expression, builder)
    }

    #[test]
    fn test_exists() {
        let (expression, builder) = compiled(Condition::exists("expiresAt"));
        assert_eq!(expression, "attribute_exists(#expiresAt_0)");
        assert_eq!(builder.attribute_names()["#expiresAt_0"], "expiresAt");
        assert!(builder.attribute_values().is_empty());
    }

    #[test]
    fn test_not_exists() {
        let (expression, _) = compiled(Condition::not_exists("id"));
        assert_eq!(expression, "attribute_not_exists(#id_0)");
    }

    #[test]
    fn test_in_strings() {
        let (expression, builder) = compiled(Condition::is_in("status", ["available", "deleted"]));
        assert_eq!(expression, "#status_0 IN (:available_0, :deleted_0)");
        assert_eq!(builder.attribute_values()[":deleted_0"], json!("deleted"));
    }

    #[test]
    fn test_in_numbers() {
        let (expression, builder) = compiled(Condition::is_in("id", [3333, 4444, 5555]));
        assert_eq!(expression, "#id_0 IN (:A3333_0, :A4444_0, :A5555_0)");
        assert_eq!(builder.attribute_values()[":A4444_0"], json!(4444));
    }

    #[test]
    fn test_equality() {
        let (expression, _) = compiled(Condition::eq("id", "abcd"));
        assert_eq!(expression, "#id_0 = :abcd_0");
        let (expression, _) = compiled(Condition::eq("updatedAt", 0));
        assert_eq!(expression, "#updatedAt_0 = :A0_0");
    }

    #[test]
    fn test_not_equal() {
        let (expression, _) = compiled(Condition::ne("id", "abcd"));
        assert_eq!(expression, "#id_0 <> :abcd_0");
    }

    #[test]
    fn test_begins_with_and_contains() {
        let (expression, _) = compiled(Condition::begins_with("name", "P"));
        assert_eq!(expression, "begins_with(#name_0, :P_0)");
        let (expression, _) = compiled(Condition::contains("tags", "rust"));
        assert_eq!(expression, "contains(#tags_0, :rust_0)");
    }

    #[test]
    fn test_between() {
        let (expression, _) = compiled(Condition::between("id", "0000", "1000"));
        assert_eq!(expression, "#id_0 BETWEEN :A0000_0 AND :A1000_0");
        let (expression, _) = compiled(Condition::between("updatedAt", 1701653045499u64, 1701653055480u64));
        assert_eq!(
            expression,
            "#updatedAt_0 BETWEEN :A1701653045499_0 AND :A1701653055480_0"
        );
    }

    #[test]
    fn test_composition() {
        let (expression, _) = compiled(
            Condition::eq("status", "open")
                .and(Condition::gt("rank", 1).or(Condition::exists("pinned")).group()),
        );
        assert_eq!(
            expression,
            "#status_0 = :open_0 AND (#rank_0 > :A1_0 OR attribute_exists(#pinned_0))"
        );
    }

    #[test]
    fn test_disjunction_under_conjunction_is_parenthesized() {
        let (expression, _) = compiled(
            Condition::eq("a", 1)
                .or(Condition::eq("b", 2))
                .and(Condition::eq("c", 3)),
        );
        assert_eq!(expression, "(#a_0 = :A1_0 OR #b_0 = :A2_0) AND #c_0 = :A3_0");
    }

    #[test]
    fn test_key_conditions_are_joined() {
        let partition_key = PartitionKeyCondition::eq("authorId", "ann");
        let sort_key = SortKeyCondition::begins_with("createdAt", "2024");
        let expressions = compile(ExpressionInput {
            partition_key: Some(&partition_key),
            sort_key: Some(&sort_key),
            ..Default::default()
        });

        assert_eq!(
            expressions.key_condition.as_deref(),
            Some("#authorId_0 = :ann_0 AND begins_with(#createdAt_0, :A2024_0)")
        );
        assert!(expressions.filter.is_none());
        assert!(expressions.condition.is_none());
        assert_eq!(expressions.attribute_names.unwrap().len(), 2);
    }

    #[test]
    fn test_aliases_are_unique_across_expressions() {
        let partition_key = PartitionKeyCondition::eq("status", "open");
        let filters = [Condition::ne("status", "closed")];
        let conditions = [Condition::exists("status")];
        let expressions = compile(ExpressionInput {
            partition_key: Some(&partition_key),
            filters: &filters,
            conditions: &conditions,
            ..Default::default()
        });

        assert_eq!(expressions.key_condition.as_deref(), Some("#status_0 = :open_0"));
        assert_eq!(expressions.filter.as_deref(), Some("#status_1 <> :closed_0"));
        assert_eq!(
            expressions.condition.as_deref(),
            Some("attribute_exists(#status_2)")
        );
        assert_eq!(expressions.attribute_names.unwrap().len(), 3);
    }

    #[test]
    fn test_multiple_filters_are_conjoined() {
        let filters = [
            Condition::eq("a", 1).or(Condition::eq("a", 2)),
            Condition::exists("b"),
        ];
        let expressions = compile(ExpressionInput {
            filters: &filters,
            ..Default::default()
        });
        assert_eq!(
            expressions.filter.as_deref(),
            Some("(#a_0 = :A1_0 OR #a_1 = :A2_0) AND attribute_exists(#b_0)")
        );
    }

    #[test]
    fn test_empty_input_omits_everything() {
        assert_eq!(compile(ExpressionInput::default()), Expressions::default());
    }

    #[test]
    fn test_update_sets_removes_and_bumps_version() {
        let update = compile_update(
            &[("title".to_string(), json!("new"))],
            &["summary".to_string()],
            "version",
            10,
        );

        assert_eq!(
            update.update,
            "SET #title_0 = :new_0, #version_0 = :A11_0 REMOVE #summary_0"
        );
        assert_eq!(
            update.condition,
            "attribute_exists(#version_1) AND #version_2 = :A10_0"
        );
        assert_eq!(update.attribute_values[":A11_0"], json!(11));
        assert_eq!(update.attribute_names["#version_2"], "version");
    }
}
