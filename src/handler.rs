//! Entry points: virtual condition calls and explicit raw conditions.
//!
//! ```text
//! handle_virtual_call(method, args)
//!   ├─ parse_call()            grammar mismatch -> NotApplicable
//!   ├─ evaluator gate          If / BasedOn may short-circuit with the untouched query
//!   ├─ direct_condition()      raw definition -> expand()
//!   │    or relation_condition()  split -> bind -> residual conditions
//!   └─ render()                not / and|or / condition-only
//! ```

use serde_json::Value;
use tracing::debug;

use crate::ast::{Combinator, ConditionOptions, Evaluator, ProcessedCondition, RawCondition};
use crate::auth::ConditionToken;
use crate::error::{ConditionError, Result};
use crate::parser::parse_call;
use crate::significance::{significance_of, Significance};
use crate::source::ConditionSource;

/// Result of a compilation request.
#[derive(Debug, Clone)]
pub enum Outcome<Q> {
    /// The derived query, or the untouched one when an evaluator short-circuited.
    Query(Q),
    /// The rendered condition, for `...Condition` calls.
    Condition(ProcessedCondition),
    /// Not a condition call this compiler knows; fall through to normal method resolution.
    NotApplicable,
}

impl<Q> Outcome<Q> {
    pub fn is_applicable(&self) -> bool {
        !matches!(self, Outcome::NotApplicable)
    }

    pub fn into_query(self) -> Option<Q> {
        match self {
            Outcome::Query(query) => Some(query),
            _ => None,
        }
    }

    pub fn into_condition(self) -> Option<ProcessedCondition> {
        match self {
            Outcome::Condition(condition) => Some(condition),
            _ => None,
        }
    }
}

/// Compiles condition calls against one query.
pub struct ConditionsHandler<'q, Q: ConditionSource> {
    pub(crate) query: &'q Q,
    pub(crate) token: ConditionToken,
    /// Nesting level of condition references, checked against
    /// [`ConditionSource::max_expansion_depth`].
    pub(crate) depth: usize,
}

impl<'q, Q: ConditionSource> ConditionsHandler<'q, Q> {
    pub fn new(query: &'q Q) -> Self {
        Self {
            query,
            token: query.conditions_token(),
            depth: 0,
        }
    }

    /// A handler for a related sub-query, one level deeper.
    pub(crate) fn nested<'r>(&self, query: &'r Q, name: &str) -> Result<ConditionsHandler<'r, Q>> {
        let depth = self.descend(name, self.depth)?;
        Ok(ConditionsHandler {
            query,
            token: query.conditions_token(),
            depth,
        })
    }

    pub(crate) fn at_depth(&self, depth: usize) -> Self {
        Self {
            query: self.query,
            token: self.token,
            depth,
        }
    }

    pub(crate) fn descend(&self, name: &str, depth: usize) -> Result<usize> {
        let limit = self.query.max_expansion_depth();
        if depth >= limit {
            return Err(ConditionError::ExpansionDepthExceeded {
                name: name.to_string(),
                depth: limit,
            });
        }
        Ok(depth + 1)
    }

    /// Compiles a call such as `andNotActiveIf(flag)` or `withAuthorNameCondition("ada")`.
    pub fn handle_virtual_call(&self, method: &str, args: &[Value]) -> Result<Outcome<Q>> {
        let Some(call) = parse_call(method) else {
            debug!(method, "not a condition call");
            return Ok(Outcome::NotApplicable);
        };
        debug!(
            method,
            base = %call.base_name,
            negate = call.negate,
            relation = call.is_relation,
            "parsed condition call"
        );

        let mut args = args.to_vec();
        let mut negate = call.negate;

        if let Some(evaluator) = call.evaluator {
            // 第一个参数是判定条件
            let subject = if args.is_empty() {
                None
            } else {
                Some(args.remove(0))
            };
            match (evaluator, significance_of(subject.as_ref())) {
                (_, Significance::Affirmative) => {}
                (Evaluator::BasedOn, Significance::Negative) => negate = !negate,
                (evaluator, significance) => {
                    debug!(method, ?evaluator, ?significance, "evaluator short-circuit");
                    return Ok(Outcome::Query(self.query.clone()));
                }
            }
        }

        let processed = if call.is_relation {
            self.relation_condition(&call.base_name, &args)?
        } else {
            self.direct_condition(&call.base_name, &args)?
        };

        match processed {
            Some(condition) => {
                self.render(condition, negate, call.combinator, call.return_condition_only)
            }
            None => {
                debug!(method, base = %call.base_name, "no condition found");
                Ok(Outcome::NotApplicable)
            }
        }
    }

    /// Expands and renders a raw condition supplied directly by the caller.
    pub fn handle_explicit_condition(
        &self,
        raw: RawCondition,
        options: ConditionOptions,
    ) -> Result<Outcome<Q>> {
        let processed = self.expand(raw)?;
        self.render(
            processed,
            options.negate,
            options.combine_with,
            options.return_condition_only,
        )
    }

    /// Expands a raw condition and merges it into the query.
    pub fn merge_raw_condition(&self, raw: RawCondition, combinator: Combinator) -> Result<Q> {
        let processed = self.expand(raw)?;
        self.query.merge_where(&processed, combinator)
    }

    /// The expanded definition of a condition declared on the query itself.
    pub(crate) fn direct_condition(&self, name: &str, args: &[Value]) -> Result<Option<ProcessedCondition>> {
        if !self.query.exists_condition(name) {
            return Ok(None);
        }
        let raw = self.query.raw_condition(name, args, &self.token)?;
        let depth = self.descend(name, self.depth)?;
        self.at_depth(depth).expand(raw).map(Some)
    }
}

/// Condition calls in method style, available on every [`ConditionSource`].
pub trait Conditions: ConditionSource {
    /// Resolves a virtual condition method.
    fn call_condition(&self, method: &str, args: &[Value]) -> Result<Outcome<Self>> {
        ConditionsHandler::new(self).handle_virtual_call(method, args)
    }

    fn where_condition(&self, raw: impl Into<RawCondition>, options: ConditionOptions) -> Result<Outcome<Self>> {
        ConditionsHandler::new(self).handle_explicit_condition(raw.into(), options)
    }

    fn and_where_condition(&self, raw: impl Into<RawCondition>) -> Result<Self> {
        ConditionsHandler::new(self).merge_raw_condition(raw.into(), Combinator::And)
    }

    fn or_where_condition(&self, raw: impl Into<RawCondition>) -> Result<Self> {
        ConditionsHandler::new(self).merge_raw_condition(raw.into(), Combinator::Or)
    }
}

impl<Q: ConditionSource> Conditions for Q {}
