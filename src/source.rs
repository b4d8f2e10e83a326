//! The capability set the compiler needs from a query builder.

use sea_query::SelectStatement;
use serde_json::Value;

use crate::ast::{Combinator, ProcessedCondition, RawCondition};
use crate::auth::ConditionToken;
use crate::error::Result;

pub const DEFAULT_MAX_EXPANSION_DEPTH: usize = 32;

/// A foreign/local column pair, `foreign` living on the related table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPair {
    pub foreign: String,
    pub local: String,
}

impl LinkPair {
    pub fn new(foreign: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            foreign: foreign.into(),
            local: local.into(),
        }
    }
}

/// The intermediate table of a compound relation.
#[derive(Debug, Clone)]
pub struct Pivot<Q> {
    /// Fresh query over the pivot table.
    pub query: Q,
    /// `pivot column => parent column`.
    pub link: Vec<LinkPair>,
}

/// Link metadata of a relation as seen from the parent query.
#[derive(Debug, Clone)]
pub struct RelationMetadata<Q> {
    /// Fresh query over the related table, not bound to any parent row.
    pub target: Q,
    /// `target column => parent column`, or `target column => pivot column`
    /// when a pivot is present.
    pub link: Vec<LinkPair>,
    pub pivot: Option<Pivot<Q>>,
}

/// Query builders able to host virtual conditions.
///
/// Every operation that changes the filter returns a derived query and
/// leaves `self` untouched.
pub trait ConditionSource: Clone + Sized {
    fn exists_condition(&self, name: &str) -> bool;

    /// The unexpanded definition of condition `name`. Requires the token
    /// handed out by [`ConditionSource::conditions_token`].
    fn raw_condition(&self, name: &str, args: &[Value], token: &ConditionToken) -> Result<RawCondition>;

    fn conditions_token(&self) -> ConditionToken;

    fn table_name(&self) -> &str;

    fn primary_key(&self) -> &str;

    /// Whether a relation named `name` (lower camel case) exists.
    fn has_relation(&self, name: &str) -> bool;

    fn relation(&self, name: &str) -> Result<Option<RelationMetadata<Self>>>;

    /// Scalar sub-query selecting `column` under the current filter.
    fn select_column(&self, column: &str) -> SelectStatement;

    fn merge_where(&self, condition: &ProcessedCondition, combinator: Combinator) -> Result<Self>;

    fn and_where_raw(&self, fragment: &str) -> Self;

    fn max_expansion_depth(&self) -> usize {
        DEFAULT_MAX_EXPANSION_DEPTH
    }
}
