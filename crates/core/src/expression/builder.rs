use std::collections::BTreeMap;

use serde_json::Value;

const MAX_ALIAS_CONTENT: usize = 16;

/// Allocates placeholder aliases for attribute names (`#...`) and values
/// (`:...`) while an expression is being compiled.
///
/// Every call allocates a fresh alias: the sanitized content followed by
/// `_i`, where `i` is the first suffix not yet used for that content.
#[derive(Debug, Clone, Default)]
pub struct ExpressionBuilder {
    names: BTreeMap<String, String>,
    values: BTreeMap<String, Value>,
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an attribute name and returns its `#` alias.
    pub fn add_name(&mut self, name: &str) -> String {
        let alias = allocate('#', name, |alias| self.names.contains_key(alias));
        self.names.insert(alias.clone(), name.to_string());
        alias
    }

    /// Registers a value and returns its `:` alias.
    pub fn add_value(&mut self, value: &Value) -> String {
        let alias = allocate(':', &alias_content(value), |alias| {
            self.values.contains_key(alias)
        });
        self.values.insert(alias.clone(), value.clone());
        alias
    }

    pub fn attribute_names(&self) -> &BTreeMap<String, String> {
        &self.names
    }

    pub fn attribute_values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Consumes the builder, omitting empty maps.
    #[allow(clippy::type_complexity)]
    pub fn into_maps(
        self,
    ) -> (
        Option<BTreeMap<String, String>>,
        Option<BTreeMap<String, Value>>,
    ) {
        let names = (!self.names.is_empty()).then_some(self.names);
        let values = (!self.values.is_empty()).then_some(self.values);
        (names, values)
    }
}

fn alias_content(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn allocate(prefix: char, content: &str, taken: impl Fn(&str) -> bool) -> String {
    let sanitized: String = content
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .take(MAX_ALIAS_CONTENT)
        .collect();
    let sanitized = if sanitized.starts_with(|c: char| c.is_ascii_alphabetic()) {
        sanitized
    } else {
        format!("A{sanitized}")
    };

    let mut i = 0;
    loop {
        let alias = format!("{prefix}{sanitized}_{i}");
        if !taken(&alias) {
            return alias;
        }
        i += 1;
    }
}
