//! Evaluation of key, filter, condition and update expressions against
//! stored items.
//!
//! Supports the subset of the expression language the client emits:
//! comparisons, `BETWEEN`, `IN`, `AND`/`OR`/`NOT`, parentheses, the
//! `attribute_exists`, `attribute_not_exists`, `begins_with` and `contains`
//! functions, and `SET`/`REMOVE` update clauses over top-level attributes.

use std::cmp::Ordering;

use serde_json::Value;

use tabletx_core::store::{AttributeNames, AttributeValues, Result, StoreError};
use tabletx_core::Item;

/// Alias maps an expression is resolved against.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Aliases<'a> {
    pub names: Option<&'a AttributeNames>,
    pub values: Option<&'a AttributeValues>,
}

/// Evaluates a condition expression. A missing item is treated as empty.
pub(crate) fn evaluate(expression: &str, aliases: Aliases<'_>, item: Option<&Item>) -> Result<bool> {
    let empty = Item::new();
    let condition = Parser::new(expression, aliases)?.condition()?;
    Ok(condition.evaluate(item.unwrap_or(&empty)))
}

/// Applies a `SET`/`REMOVE` update expression to `item`.
pub(crate) fn apply_update(expression: &str, aliases: Aliases<'_>, item: &mut Item) -> Result<()> {
    let update = Parser::new(expression, aliases)?.update()?;
    for (name, operand) in update.set {
        match operand {
            Operand::Value(value) => {
                item.insert(name, value);
            }
            Operand::Path(source) => {
                let value = item.get(&source).cloned().ok_or_else(|| {
                    invalid(format!("attribute \"{source}\" used in SET does not exist"))
                })?;
                item.insert(name, value);
            }
        }
    }
    for name in update.remove {
        item.remove(&name);
    }
    Ok(())
}

/// Orders two attribute values: numbers numerically, strings
/// lexicographically, and values of different types by type.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => type_rank(a)
            .cmp(&type_rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Ordering::Equal,
        _ => a == b,
    }
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::Validation(message.into())
}

// ============================================================================
// Syntax tree
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Path(String),
    Value(Value),
}

impl Operand {
    fn resolve<'a>(&'a self, item: &'a Item) -> Option<&'a Value> {
        match self {
            Self::Path(name) => item.get(name),
            Self::Value(value) => Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Compare(Operand, Comparison, Operand),
    Between(Operand, Operand, Operand),
    In(Operand, Vec<Operand>),
    Exists(String),
    NotExists(String),
    BeginsWith(Operand, Operand),
    Contains(Operand, Operand),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    fn evaluate(&self, item: &Item) -> bool {
        match self {
            Self::Compare(left, comparison, right) => {
                let (left, right) = (left.resolve(item), right.resolve(item));
                match comparison {
                    Comparison::Eq => matches!((left, right), (Some(l), Some(r)) if values_equal(l, r)),
                    Comparison::Ne => !matches!((left, right), (Some(l), Some(r)) if values_equal(l, r)),
                    _ => match (left, right) {
                        (Some(l), Some(r)) if comparable(l, r) => {
                            let ordering = compare_values(l, r);
                            match comparison {
                                Comparison::Lt => ordering == Ordering::Less,
                                Comparison::Gt => ordering == Ordering::Greater,
                                Comparison::Le => ordering != Ordering::Greater,
                                _ => ordering != Ordering::Less,
                            }
                        }
                        _ => false,
                    },
                }
            }
            Self::Between(operand, low, high) => {
                match (operand.resolve(item), low.resolve(item), high.resolve(item)) {
                    (Some(v), Some(low), Some(high)) if comparable(v, low) && comparable(v, high) => {
                        compare_values(v, low) != Ordering::Less
                            && compare_values(v, high) != Ordering::Greater
                    }
                    _ => false,
                }
            }
            Self::In(operand, candidates) => match operand.resolve(item) {
                Some(value) => candidates
                    .iter()
                    .filter_map(|c| c.resolve(item))
                    .any(|c| values_equal(value, c)),
                None => false,
            },
            Self::Exists(name) => item.contains_key(name),
            Self::NotExists(name) => !item.contains_key(name),
            Self::BeginsWith(operand, prefix) => {
                match (operand.resolve(item), prefix.resolve(item)) {
                    (Some(Value::String(value)), Some(Value::String(prefix))) => {
                        value.starts_with(prefix.as_str())
                    }
                    _ => false,
                }
            }
            Self::Contains(operand, needle) => match (operand.resolve(item), needle.resolve(item)) {
                (Some(Value::String(value)), Some(Value::String(needle))) => {
                    value.contains(needle.as_str())
                }
                (Some(Value::Array(values)), Some(needle)) => {
                    values.iter().any(|v| values_equal(v, needle))
                }
                _ => false,
            },
            Self::And(left, right) => left.evaluate(item) && right.evaluate(item),
            Self::Or(left, right) => left.evaluate(item) || right.evaluate(item),
            Self::Not(inner) => !inner.evaluate(item),
        }
    }
}

fn comparable(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_))
    )
}

#[derive(Debug, Default)]
struct Update {
    set: Vec<(String, Operand)>,
    remove: Vec<String>,
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    LParen,
    RParen,
    Comma,
    Comparison(Comparison),
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Comparison(Comparison::Eq));
            }
            '<' => {
                chars.next();
                let comparison = match chars.peek() {
                    Some('>') => Comparison::Ne,
                    Some('=') => Comparison::Le,
                    _ => Comparison::Lt,
                };
                if comparison != Comparison::Lt {
                    chars.next();
                }
                tokens.push(Token::Comparison(comparison));
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Comparison(Comparison::Ge));
                } else {
                    tokens.push(Token::Comparison(Comparison::Gt));
                }
            }
            c if c.is_ascii_alphanumeric() || matches!(c, '#' | ':' | '_' | '.' | '-') => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || matches!(c, '#' | ':' | '_' | '.' | '-') {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            other => return Err(invalid(format!("unexpected character '{other}' in expression"))),
        }
    }
    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    tokens: Vec<Token>,
    position: usize,
    aliases: Aliases<'a>,
}

impl<'a> Parser<'a> {
    fn new(input: &str, aliases: Aliases<'a>) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(input)?,
            position: 0,
            aliases,
        })
    }

    fn condition(mut self) -> Result<Expr> {
        let expr = self.or()?;
        self.expect_end()?;
        Ok(expr)
    }

    fn update(mut self) -> Result<Update> {
        let mut update = Update::default();
        while self.peek().is_some() {
            if self.eat_keyword("SET") {
                loop {
                    let name = self.path()?;
                    self.expect(&Token::Comparison(Comparison::Eq))?;
                    let operand = self.operand()?;
                    update.set.push((name, operand));
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
            } else if self.eat_keyword("REMOVE") {
                loop {
                    update.remove.push(self.path()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
            } else {
                return Err(invalid("update expression must use SET or REMOVE clauses"));
            }
        }
        if update.set.is_empty() && update.remove.is_empty() {
            return Err(invalid("empty update expression"));
        }
        Ok(update)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut left = self.and()?;
        while self.eat_keyword("OR") {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut left = self.not()?;
        while self.eat_keyword("AND") {
            let right = self.not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.eat(&Token::LParen) {
            let inner = self.or()?;
            self.expect(&Token::RParen)?;
            return Ok(inner);
        }

        if let Some(function) = self.function_name() {
            self.position += 1;
            self.expect(&Token::LParen)?;
            let expr = match function.as_str() {
                "attribute_exists" => Expr::Exists(self.path()?),
                "attribute_not_exists" => Expr::NotExists(self.path()?),
                "begins_with" => {
                    let operand = self.operand()?;
                    self.expect(&Token::Comma)?;
                    Expr::BeginsWith(operand, self.operand()?)
                }
                "contains" => {
                    let operand = self.operand()?;
                    self.expect(&Token::Comma)?;
                    Expr::Contains(operand, self.operand()?)
                }
                other => return Err(invalid(format!("unsupported function {other}"))),
            };
            self.expect(&Token::RParen)?;
            return Ok(expr);
        }

        let left = self.operand()?;
        if self.eat_keyword("BETWEEN") {
            let low = self.operand()?;
            if !self.eat_keyword("AND") {
                return Err(invalid("BETWEEN requires AND"));
            }
            let high = self.operand()?;
            return Ok(Expr::Between(left, low, high));
        }
        if self.eat_keyword("IN") {
            self.expect(&Token::LParen)?;
            let mut candidates = vec![self.operand()?];
            while self.eat(&Token::Comma) {
                candidates.push(self.operand()?);
            }
            self.expect(&Token::RParen)?;
            return Ok(Expr::In(left, candidates));
        }
        match self.next() {
            Some(Token::Comparison(comparison)) => {
                let right = self.operand()?;
                Ok(Expr::Compare(left, comparison, right))
            }
            other => Err(invalid(format!("expected a comparison, found {other:?}"))),
        }
    }

    fn function_name(&self) -> Option<String> {
        match (self.tokens.get(self.position), self.tokens.get(self.position + 1)) {
            (Some(Token::Word(word)), Some(Token::LParen)) => Some(word.to_ascii_lowercase()),
            _ => None,
        }
    }

    fn operand(&mut self) -> Result<Operand> {
        match self.next() {
            Some(Token::Word(word)) if word.starts_with(':') => self
                .aliases
                .values
                .and_then(|values| values.get(&word))
                .cloned()
                .map(Operand::Value)
                .ok_or_else(|| invalid(format!("undefined attribute value {word}"))),
            Some(Token::Word(word)) => Ok(Operand::Path(self.resolve_name(word)?)),
            other => Err(invalid(format!("expected an operand, found {other:?}"))),
        }
    }

    fn path(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Word(word)) if !word.starts_with(':') => self.resolve_name(word),
            other => Err(invalid(format!("expected an attribute name, found {other:?}"))),
        }
    }

    fn resolve_name(&self, word: String) -> Result<String> {
        if word.starts_with('#') {
            return self
                .aliases
                .names
                .and_then(|names| names.get(&word))
                .cloned()
                .ok_or_else(|| invalid(format!("undefined attribute name {word}")));
        }
        Ok(word)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword) => {
                self.position += 1;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(invalid(format!("expected {token:?}, found {:?}", self.peek())))
        }
    }

    fn expect_end(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(invalid(format!("unexpected trailing {token:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> Item {
        value.as_object().cloned().unwrap()
    }

    fn names(pairs: &[(&str, &str)]) -> AttributeNames {
        pairs
            .iter()
            .map(|(a, n)| (a.to_string(), n.to_string()))
            .collect()
    }

    fn values(pairs: &[(&str, Value)]) -> AttributeValues {
        pairs
            .iter()
            .map(|(a, v)| (a.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_comparisons() {
        let names = names(&[("#n_0", "rank")]);
        let values = values(&[(":v_0", json!(3))]);
        let aliases = Aliases {
            names: Some(&names),
            values: Some(&values),
        };
        let stored = item(json!({"rank": 5}));

        assert!(evaluate("#n_0 > :v_0", aliases, Some(&stored)).unwrap());
        assert!(evaluate("#n_0 <> :v_0", aliases, Some(&stored)).unwrap());
        assert!(!evaluate("#n_0 <= :v_0", aliases, Some(&stored)).unwrap());
        assert!(!evaluate("#n_0 = :v_0", aliases, Some(&stored)).unwrap());
    }

    #[test]
    fn test_numbers_compare_numerically() {
        let values = values(&[(":v_0", json!(10.0))]);
        let aliases = Aliases {
            names: None,
            values: Some(&values),
        };
        let stored = item(json!({"rank": 10}));
        assert!(evaluate("rank = :v_0", aliases, Some(&stored)).unwrap());
    }

    #[test]
    fn test_missing_attribute_fails_comparisons() {
        let values = values(&[(":v_0", json!("a"))]);
        let aliases = Aliases {
            names: None,
            values: Some(&values),
        };
        assert!(!evaluate("title = :v_0", aliases, Some(&Item::new())).unwrap());
        assert!(evaluate("title <> :v_0", aliases, Some(&Item::new())).unwrap());
    }

    #[test]
    fn test_functions_and_precedence() {
        let values = values(&[(":p_0", json!("he")), (":x_0", json!("zz"))]);
        let aliases = Aliases {
            names: None,
            values: Some(&values),
        };
        let stored = item(json!({"title": "hello", "tags": ["zz"]}));

        assert!(evaluate("begins_with(title, :p_0)", aliases, Some(&stored)).unwrap());
        assert!(evaluate("contains(tags, :x_0)", aliases, Some(&stored)).unwrap());
        assert!(evaluate(
            "attribute_not_exists(body) AND (title = :x_0 OR contains(tags, :x_0))",
            aliases,
            Some(&stored)
        )
        .unwrap());
        assert!(!evaluate(
            "attribute_not_exists(title) AND title = :x_0 OR title = :x_0",
            aliases,
            Some(&stored)
        )
        .unwrap());
    }

    #[test]
    fn test_between_and_in() {
        let values = values(&[
            (":lo", json!(1)),
            (":hi", json!(5)),
            (":a", json!("a")),
            (":b", json!("b")),
        ]);
        let aliases = Aliases {
            names: None,
            values: Some(&values),
        };
        let stored = item(json!({"rank": 5, "tag": "b"}));

        assert!(evaluate("rank BETWEEN :lo AND :hi AND tag IN (:a, :b)", aliases, Some(&stored)).unwrap());
    }

    #[test]
    fn test_missing_item_is_empty() {
        let aliases = Aliases::default();
        assert!(evaluate("attribute_not_exists(id)", aliases, None).unwrap());
        assert!(!evaluate("attribute_exists(id)", aliases, None).unwrap());
    }

    #[test]
    fn test_undefined_alias_is_rejected() {
        let error = evaluate("#missing_0 = :v_0", Aliases::default(), None).unwrap_err();
        assert!(matches!(error, StoreError::Validation(_)));
    }

    #[test]
    fn test_apply_update() {
        let names = names(&[("#t_0", "title"), ("#s_0", "summary"), ("#v_0", "version")]);
        let values = values(&[(":t_0", json!("new")), (":v_0", json!(2))]);
        let aliases = Aliases {
            names: Some(&names),
            values: Some(&values),
        };
        let mut stored = item(json!({"id": "a", "title": "old", "summary": "s", "version": 1}));

        apply_update("SET #t_0 = :t_0, #v_0 = :v_0 REMOVE #s_0", aliases, &mut stored).unwrap();
        assert_eq!(Value::Object(stored), json!({"id": "a", "title": "new", "version": 2}));
    }

    #[test]
    fn test_compare_values_orders_by_type_then_value() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!("10"), &json!("2")), Ordering::Less);
        assert_eq!(compare_values(&json!(10), &json!("1")), Ordering::Less);
    }
}
