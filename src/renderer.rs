use tracing::trace;

use crate::ast::{Combinator, ProcessedCondition};
use crate::error::Result;
use crate::handler::{ConditionsHandler, Outcome};
use crate::source::ConditionSource;

impl<'q, Q: ConditionSource> ConditionsHandler<'q, Q> {
    /// Applies negation, then either hands the condition back or merges it
    /// into a derived query with `combinator`.
    pub(crate) fn render(
        &self,
        processed: ProcessedCondition,
        negate: bool,
        combinator: Combinator,
        return_condition_only: bool,
    ) -> Result<Outcome<Q>> {
        let processed = if negate { processed.negated() } else { processed };
        trace!(?processed, negate, ?combinator, return_condition_only, "rendering condition");

        if return_condition_only {
            return Ok(Outcome::Condition(processed));
        }
        if processed.is_empty() {
            return Ok(Outcome::Query(self.query.clone()));
        }
        self.query
            .merge_where(&processed, combinator)
            .map(Outcome::Query)
    }
}
