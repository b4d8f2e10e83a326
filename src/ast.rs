//! Condition trees and the decoded form of a virtual condition call.

use sea_query::{PostgresQueryBuilder, SelectStatement};
use serde_json::Value;

/// How a rendered condition is merged into the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    #[default]
    And,
    Or,
}

/// Gate applied to the first call argument before the condition is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluator {
    /// `...If`: proceed only when the argument is affirmative.
    If,
    /// `...BasedOn`: proceed when the argument is significant, negating on a negative one.
    BasedOn,
}

/// The modifiers extracted from a virtual method name such as `orNotActiveIfCondition`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualCallSpec {
    pub combinator: Combinator,
    pub negate: bool,
    /// Lower-camel-case condition name, e.g. `active` or `withAuthorName`.
    pub base_name: String,
    pub evaluator: Option<Evaluator>,
    pub return_condition_only: bool,
    pub is_relation: bool,
}

/// Options for compiling an explicit raw condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConditionOptions {
    pub combine_with: Combinator,
    pub return_condition_only: bool,
    pub negate: bool,
}

/// User input before expansion.
///
/// A [`RawCondition::Name`] is either a condition reference (`"active"`,
/// `"elems:1,2"`, `"withAuthor"`) or an opaque token such as an operator or
/// a column name. Values under a [`RawCondition::Map`] key are data and are
/// never looked up as condition names.
#[derive(Debug, Clone)]
pub enum RawCondition {
    Name(String),
    Literal(Value),
    List(Vec<RawCondition>),
    Map(Vec<(String, RawCondition)>),
    SubQuery(Box<SelectStatement>),
}

impl RawCondition {
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RawCondition>,
    {
        RawCondition::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, RawCondition)>,
    {
        RawCondition::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Converts a JSON document into a raw condition. Arrays become lists,
    /// objects keep their key order, strings become names.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => RawCondition::Name(s),
            Value::Array(items) => RawCondition::List(items.into_iter().map(Self::from_json).collect()),
            Value::Object(entries) => RawCondition::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
            other => RawCondition::Literal(other),
        }
    }
}

impl From<&str> for RawCondition {
    fn from(s: &str) -> Self {
        RawCondition::Name(s.to_string())
    }
}

impl From<String> for RawCondition {
    fn from(s: String) -> Self {
        RawCondition::Name(s)
    }
}

impl From<Value> for RawCondition {
    fn from(value: Value) -> Self {
        RawCondition::from_json(value)
    }
}

impl From<SelectStatement> for RawCondition {
    fn from(select: SelectStatement) -> Self {
        RawCondition::SubQuery(Box::new(select))
    }
}

/// A fully expanded boolean tree, ready for the query builder.
///
/// The shape follows the usual array condition format: a map is a hash
/// condition (`column => value`), a list headed by an operand is an operator
/// condition (`["not", ...]`, `["and", ...]`, `[">", "age", 18]`).
#[derive(Debug, Clone)]
pub enum ProcessedCondition {
    Operand(String),
    Value(Value),
    List(Vec<ProcessedCondition>),
    Map(Vec<(String, ProcessedCondition)>),
    SubQuery(Box<SelectStatement>),
}

impl ProcessedCondition {
    /// The empty hash condition. Merging it leaves a query untouched.
    pub fn empty() -> Self {
        ProcessedCondition::Map(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ProcessedCondition::Map(entries) => entries.is_empty(),
            ProcessedCondition::List(items) => items.is_empty(),
            ProcessedCondition::Operand(s) => s.is_empty(),
            ProcessedCondition::Value(v) => v.is_null(),
            ProcessedCondition::SubQuery(_) => false,
        }
    }

    /// Wraps the condition in a logical NOT marker: `["not", condition]`.
    pub fn negated(self) -> Self {
        ProcessedCondition::List(vec![ProcessedCondition::Operand("not".to_string()), self])
    }

    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ProcessedCondition)>,
    {
        ProcessedCondition::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn operand(s: impl Into<String>) -> Self {
        ProcessedCondition::Operand(s.into())
    }
}

impl From<Value> for ProcessedCondition {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => ProcessedCondition::Operand(s),
            other => ProcessedCondition::Value(other),
        }
    }
}

impl From<&str> for ProcessedCondition {
    fn from(s: &str) -> Self {
        ProcessedCondition::Operand(s.to_string())
    }
}

// Sub-queries compare by the SQL they render to.
impl PartialEq for ProcessedCondition {
    fn eq(&self, other: &Self) -> bool {
        use ProcessedCondition::*;
        match (self, other) {
            (Operand(a), Operand(b)) => a == b,
            (Value(a), Value(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (SubQuery(a), SubQuery(b)) => {
                a.to_string(PostgresQueryBuilder) == b.to_string(PostgresQueryBuilder)
            }
            _ => false,
        }
    }
}

impl From<ProcessedCondition> for RawCondition {
    fn from(processed: ProcessedCondition) -> Self {
        match processed {
            ProcessedCondition::Operand(s) => RawCondition::Name(s),
            ProcessedCondition::Value(v) => RawCondition::Literal(v),
            ProcessedCondition::List(items) => {
                RawCondition::List(items.into_iter().map(Into::into).collect())
            }
            ProcessedCondition::Map(entries) => RawCondition::Map(
                entries.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
            ProcessedCondition::SubQuery(select) => RawCondition::SubQuery(select),
        }
    }
}
