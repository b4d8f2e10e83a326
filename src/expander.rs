//! Recursive expansion of raw conditions.
//!
//! Names that refer to a condition of the query are replaced by that
//! condition's definition, `with...` names by the relation condition they
//! compile to; everything else is kept as an opaque operand. Expansion
//! repeats until a fixed point is reached, so the output of [`expand`] is
//! itself a valid input that expands to the same tree.
//!
//! [`expand`]: ConditionsHandler::expand

use tracing::trace;

use crate::ast::{ProcessedCondition, RawCondition};
use crate::error::{ConditionError, Result};
use crate::handler::{ConditionsHandler, Outcome};
use crate::parser::parse_reference;
use crate::source::ConditionSource;

impl<'q, Q: ConditionSource> ConditionsHandler<'q, Q> {
    pub fn expand(&self, raw: RawCondition) -> Result<ProcessedCondition> {
        self.expand_at(raw, self.depth)
    }

    fn expand_at(&self, raw: RawCondition, depth: usize) -> Result<ProcessedCondition> {
        match raw {
            RawCondition::List(items) => items
                .into_iter()
                .map(|item| self.expand_at(item, depth))
                .collect::<Result<Vec<_>>>()
                .map(ProcessedCondition::List),
            RawCondition::Map(entries) => Ok(ProcessedCondition::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, hash_value(value)))
                    .collect(),
            )),
            RawCondition::Literal(value) => Ok(ProcessedCondition::Value(value)),
            RawCondition::SubQuery(select) => Ok(ProcessedCondition::SubQuery(select)),
            RawCondition::Name(token) => match self.expand_name(&token, depth)? {
                Some((definition, depth)) => self.expand_at(definition, depth),
                None => Ok(ProcessedCondition::Operand(token)),
            },
        }
    }

    /// One expansion step for a name token, with the depth its definition lives at.
    fn expand_name(&self, token: &str, depth: usize) -> Result<Option<(RawCondition, usize)>> {
        let Some(reference) = parse_reference(token) else {
            return Ok(None);
        };

        if self.query.exists_condition(&reference.name) {
            let depth = self.descend(&reference.name, depth)?;
            trace!(token, depth, "expanding direct condition");
            let raw = self
                .query
                .raw_condition(&reference.name, &reference.args, &self.token)?;
            return Ok(Some((raw, depth)));
        }

        if reference.is_relation() {
            let depth = self.descend(&reference.name, depth)?;
            trace!(token, depth, "expanding relation condition");
            let method = format!("{}Condition", reference.name);
            let resolved = match self.at_depth(depth).handle_virtual_call(&method, &reference.args)? {
                Outcome::Condition(condition) => condition.into(),
                // an evaluator declined to filter
                Outcome::Query(_) => RawCondition::Map(Vec::new()),
                Outcome::NotApplicable => {
                    return Err(ConditionError::UnresolvedReference(token.to_string()))
                }
            };
            return Ok(Some((resolved, depth)));
        }

        Ok(None)
    }
}

/// Everything under a hash key is data, however deeply nested.
fn hash_value(raw: RawCondition) -> ProcessedCondition {
    match raw {
        RawCondition::Name(name) => ProcessedCondition::Operand(name),
        RawCondition::Literal(value) => ProcessedCondition::Value(value),
        RawCondition::List(items) => ProcessedCondition::List(items.into_iter().map(hash_value).collect()),
        RawCondition::Map(entries) => ProcessedCondition::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key, hash_value(value)))
                .collect(),
        ),
        RawCondition::SubQuery(select) => ProcessedCondition::SubQuery(select),
    }
}
