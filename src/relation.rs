//! Relation conditions: `withAuthorName("ada")`, `withProducts({"sku": "X"})`.
//!
//! ```text
//! withAuthorNameActive
//!   └─ words: Author | Name | Active
//!        ├─ shortest prefix naming a relation: "author"
//!        └─ residual words re-joined into target conditions: "name", "active"
//! ```
//!
//! A direct relation correlates as
//! `{parent.local: SELECT target.foreign FROM target WHERE parent.local = target.foreign ...}`.
//! A pivot relation nests one more level:
//! `{parent.local: SELECT pivot.foreign FROM pivot WHERE pivot.remote_local IN
//! (SELECT target.remote_foreign ...) AND parent.local = pivot.foreign}`.

use serde_json::Value;
use tracing::{debug, warn};

use crate::ast::{Combinator, ProcessedCondition, RawCondition};
use crate::error::{ConditionError, Result};
use crate::handler::ConditionsHandler;
use crate::lexer::split_words;
use crate::source::{ConditionSource, LinkPair, RelationMetadata};
use crate::token::{join_words, lcfirst, Word};

/// A `with...` base name split into a relation and the words after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSplit<'a> {
    pub relation_name: Option<String>,
    pub residual_words: Vec<Word<'a>>,
}

/// Finds the shortest word prefix of `base_name` (after `with`) naming a relation of `query`.
pub fn split_relation<'a, Q: ConditionSource>(query: &Q, base_name: &'a str) -> RelationSplit<'a> {
    let rest = base_name.get(4..).unwrap_or_default();
    let words = split_words(rest);

    for end in 1..=words.len() {
        let candidate = lcfirst(&join_words(&words[..end]));
        if query.has_relation(&candidate) {
            return RelationSplit {
                relation_name: Some(candidate),
                residual_words: words[end..].to_vec(),
            };
        }
    }

    RelationSplit {
        relation_name: None,
        residual_words: Vec::new(),
    }
}

/// Groups `words` into condition names of `query`, first match wins.
/// `None` when trailing words do not complete a condition name.
pub fn conditions_from_words<Q: ConditionSource>(query: &Q, words: &[Word<'_>]) -> Option<Vec<String>> {
    let mut chain = String::new();
    let mut chain_start = 0;
    let mut conditions = Vec::new();
    for word in words {
        if chain.is_empty() {
            chain_start = word.span.start;
        }
        chain.push_str(word.text);
        let candidate = lcfirst(&chain);
        if query.exists_condition(&candidate) {
            conditions.push(candidate);
            chain.clear();
        }
    }
    if !chain.is_empty() {
        debug!(unmatched = %chain, offset = chain_start, "words do not complete a condition name");
        return None;
    }
    Some(conditions)
}

#[derive(Debug, Clone)]
enum Correlation<Q> {
    Direct {
        local: String,
        foreign: String,
    },
    Compound {
        local: String,
        pivot_foreign: String,
        remote_local: String,
        remote_foreign: String,
        pivot: Q,
    },
}

/// A correlated sub-query over the related table and the way it links to the parent.
#[derive(Debug, Clone)]
pub struct RelationBinding<Q> {
    /// Target query that relation conditions are applied to.
    pub sub_query: Q,
    correlation: Correlation<Q>,
}

fn first_link(link: &[LinkPair], error: impl FnOnce() -> ConditionError) -> Result<&LinkPair> {
    let first = link.first().ok_or_else(error)?;
    if link.len() > 1 {
        warn!(
            foreign = %first.foreign,
            local = %first.local,
            "composite link; only the first column pair is correlated"
        );
    }
    Ok(first)
}

impl<Q: ConditionSource> RelationBinding<Q> {
    pub fn prepare(parent: &Q, name: &str, relation: RelationMetadata<Q>) -> Result<Self> {
        let RelationMetadata { target, link, pivot } = relation;

        let Some(pivot) = pivot else {
            let link = first_link(&link, || ConditionError::MalformedLink {
                relation: name.to_string(),
            })?;
            let local = format!("{}.{}", parent.table_name(), link.local);
            let foreign = format!("{}.{}", target.table_name(), link.foreign);
            let sub_query = target.and_where_raw(&format!("{local} = {foreign}"));
            return Ok(Self {
                sub_query,
                correlation: Correlation::Direct { local, foreign },
            });
        };

        let remote = first_link(&link, || ConditionError::MalformedLink {
            relation: name.to_string(),
        })?;
        let pivot_link = first_link(&pivot.link, || ConditionError::MalformedCompoundLink {
            relation: name.to_string(),
        })?;

        let pivot_table = pivot.query.table_name();
        let local = format!("{}.{}", parent.table_name(), pivot_link.local);
        let pivot_foreign = format!("{pivot_table}.{}", pivot_link.foreign);
        let remote_local = format!("{pivot_table}.{}", remote.local);
        let remote_foreign = format!("{}.{}", target.table_name(), remote.foreign);

        let sub_query = target.and_where_raw(&format!("{remote_local} = {remote_foreign}"));
        Ok(Self {
            sub_query,
            correlation: Correlation::Compound {
                local,
                pivot_foreign,
                remote_local,
                remote_foreign,
                pivot: pivot.query.clone(),
            },
        })
    }

    /// The condition correlating the parent query with the (filtered) sub-query.
    pub fn into_condition(self) -> Result<ProcessedCondition> {
        match self.correlation {
            Correlation::Direct { local, foreign } => Ok(ProcessedCondition::map([(
                local,
                ProcessedCondition::SubQuery(Box::new(self.sub_query.select_column(&foreign))),
            )])),
            Correlation::Compound {
                local,
                pivot_foreign,
                remote_local,
                remote_foreign,
                pivot,
            } => {
                let target = ProcessedCondition::map([(
                    remote_local,
                    ProcessedCondition::SubQuery(Box::new(self.sub_query.select_column(&remote_foreign))),
                )]);
                let pivot = pivot
                    .merge_where(&target, Combinator::And)?
                    .and_where_raw(&format!("{local} = {pivot_foreign}"));
                Ok(ProcessedCondition::map([(
                    local,
                    ProcessedCondition::SubQuery(Box::new(pivot.select_column(&pivot_foreign))),
                )]))
            }
        }
    }
}

impl<'q, Q: ConditionSource> ConditionsHandler<'q, Q> {
    /// Correlated condition for a `with...` base name, `None` when it names no relation
    /// or its residual words are not conditions of the related model.
    pub(crate) fn relation_condition(&self, base_name: &str, args: &[Value]) -> Result<Option<ProcessedCondition>> {
        let split = split_relation(self.query, base_name);
        let Some(relation_name) = split.relation_name else {
            debug!(base = base_name, "no relation matches");
            return Ok(None);
        };
        let Some(metadata) = self.query.relation(&relation_name)? else {
            return Ok(None);
        };
        let residual: Vec<&str> = split.residual_words.iter().map(|w| w.text).collect();
        debug!(relation = %relation_name, ?residual, "resolved relation");

        let binding = RelationBinding::prepare(self.query, &relation_name, metadata)?;
        match self.apply_conditions_to_relation(binding, &relation_name, &split.residual_words, args)? {
            Some(binding) => binding.into_condition().map(Some),
            None => Ok(None),
        }
    }

    /// Residual words name conditions of the target; without them the first
    /// argument is the raw condition for the target.
    fn apply_conditions_to_relation(
        &self,
        mut binding: RelationBinding<Q>,
        relation_name: &str,
        words: &[Word<'_>],
        args: &[Value],
    ) -> Result<Option<RelationBinding<Q>>> {
        if !words.is_empty() {
            let Some(conditions) = conditions_from_words(&binding.sub_query, words) else {
                debug!(relation = relation_name, "residual words are not relation conditions");
                return Ok(None);
            };
            for condition in conditions {
                let handler = self.nested(&binding.sub_query, &condition)?;
                let processed = handler.direct_condition(&condition, args)?;
                if let Some(processed) = processed {
                    binding.sub_query = binding.sub_query.merge_where(&processed, Combinator::And)?;
                }
            }
            return Ok(Some(binding));
        }

        if let Some((first, rest)) = args.split_first() {
            if !rest.is_empty() {
                warn!(
                    relation = relation_name,
                    ignored = rest.len(),
                    "relation condition takes a single argument"
                );
            }
            let handler = self.nested(&binding.sub_query, relation_name)?;
            let sub_query = handler.merge_raw_condition(RawCondition::from_json(first.clone()), Combinator::And)?;
            binding.sub_query = sub_query;
        }
        Ok(Some(binding))
    }
}
