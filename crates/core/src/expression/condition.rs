use std::fmt;

use serde_json::Value;

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Comparator {
    /// Parses an operator symbol. `!=` is accepted as an alias of `<>`.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(Self::Eq),
            "<>" | "!=" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            ">" => Some(Self::Gt),
            "<=" => Some(Self::Le),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter or condition-check condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        attribute: String,
        comparator: Comparator,
        value: Value,
    },
    BeginsWith {
        attribute: String,
        prefix: Value,
    },
    Contains {
        attribute: String,
        operand: Value,
    },
    Between {
        attribute: String,
        low: Value,
        high: Value,
    },
    In {
        attribute: String,
        values: Vec<Value>,
    },
    Exists {
        attribute: String,
    },
    NotExists {
        attribute: String,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    /// Parenthesized condition.
    Group(Box<Condition>),
}

impl Condition {
    pub fn compare(
        attribute: impl Into<String>,
        comparator: Comparator,
        value: impl Into<Value>,
    ) -> Self {
        Self::Compare {
            attribute: attribute.into(),
            comparator,
            value: value.into(),
        }
    }

    pub fn eq(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, Comparator::Eq, value)
    }

    pub fn ne(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, Comparator::Ne, value)
    }

    pub fn lt(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, Comparator::Lt, value)
    }

    pub fn gt(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, Comparator::Gt, value)
    }

    pub fn le(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, Comparator::Le, value)
    }

    pub fn ge(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attribute, Comparator::Ge, value)
    }

    pub fn begins_with(attribute: impl Into<String>, prefix: impl Into<Value>) -> Self {
        Self::BeginsWith {
            attribute: attribute.into(),
            prefix: prefix.into(),
        }
    }

    pub fn contains(attribute: impl Into<String>, operand: impl Into<Value>) -> Self {
        Self::Contains {
            attribute: attribute.into(),
            operand: operand.into(),
        }
    }

    pub fn between(
        attribute: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::Between {
            attribute: attribute.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            attribute: attribute.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exists(attribute: impl Into<String>) -> Self {
        Self::Exists {
            attribute: attribute.into(),
        }
    }

    pub fn not_exists(attribute: impl Into<String>) -> Self {
        Self::NotExists {
            attribute: attribute.into(),
        }
    }

    pub fn and(self, other: Condition) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn group(self) -> Self {
        Self::Group(Box::new(self))
    }

    /// The attribute a single-attribute condition tests; `None` for
    /// compound conditions.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::Compare { attribute, .. }
            | Self::BeginsWith { attribute, .. }
            | Self::Contains { attribute, .. }
            | Self::Between { attribute, .. }
            | Self::In { attribute, .. }
            | Self::Exists { attribute }
            | Self::NotExists { attribute } => Some(attribute),
            Self::Group(inner) => inner.attribute(),
            Self::And(..) | Self::Or(..) => None,
        }
    }
}

/// The partition key condition of a query. Only equality is allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionKeyCondition(Condition);

impl PartitionKeyCondition {
    pub fn eq(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self(Condition::eq(attribute, value))
    }

    pub fn condition(&self) -> &Condition {
        &self.0
    }

    pub fn attribute(&self) -> &str {
        self.0.attribute().unwrap_or_default()
    }
}

/// The sort key condition of a query.
///
/// Only `=`, `<`, `>`, `<=`, `>=`, `begins_with` and `BETWEEN` are allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKeyCondition(Condition);

impl SortKeyCondition {
    pub fn eq(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self(Condition::eq(attribute, value))
    }

    pub fn lt(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self(Condition::lt(attribute, value))
    }

    pub fn gt(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self(Condition::gt(attribute, value))
    }

    pub fn le(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self(Condition::le(attribute, value))
    }

    pub fn ge(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self(Condition::ge(attribute, value))
    }

    pub fn begins_with(attribute: impl Into<String>, prefix: impl Into<Value>) -> Self {
        Self(Condition::begins_with(attribute, prefix))
    }

    pub fn between(
        attribute: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self(Condition::between(attribute, low, high))
    }

    pub fn condition(&self) -> &Condition {
        &self.0
    }

    pub fn attribute(&self) -> &str {
        self.0.attribute().unwrap_or_default()
    }
}
