//! Virtual condition-call grammar.
//!
//! ## 语法
//!
//! ```text
//! CallName       := Combinator? NegationPrefix? Base EvaluatorSuffix? "Condition"?
//! Combinator     := "and" | "or"              (absent => and)
//! NegationPrefix := "Not"                     (after a combinator)
//!                 | "not"                     (standalone)
//! Base           := UpperCamelWord            (after combinator / negation)
//!                 | lowerCamelWord            (standalone form)
//! EvaluatorSuffix:= "If" | "BasedOn"
//! ```
//!
//! ## 示例
//!
//! ```text
//! active                      -> and, base "active", merge into query
//! orNotActiveIf               -> or, negated, evaluator If
//! notPublishedCondition       -> and, negated, return the condition only
//! andWithAuthorNameCondition  -> relation call on "withAuthorName"
//! ```
//!
//! The base is matched lazily so an evaluator or `Condition` suffix is never
//! swallowed into the condition name.
//!
//! Raw conditions reference other conditions with `name` or
//! `name:arg1,arg2`; [`parse_reference`] splits that form.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::ast::{Combinator, Evaluator, VirtualCallSpec};
use crate::token::lcfirst;

static CALL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:(and|or)(Not)?|(not))([A-Z]\w+?)|([a-z]\w+?))(If|BasedOn)?(Condition)?$")
        .expect("call pattern is valid")
});

static REFERENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)(?::(.*))?$").expect("reference pattern is valid"));

static RELATION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[wW]ith[A-Z]").expect("relation pattern is valid"));

static RELATION_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^with[A-Z]\w+$").expect("relation reference pattern is valid"));

/// Decodes a virtual method name. `None` means the name is not a condition call.
pub fn parse_call(method: &str) -> Option<VirtualCallSpec> {
    let caps = CALL_PATTERN.captures(method)?;

    let combinator = match caps.get(1).map(|m| m.as_str()) {
        Some("or") => Combinator::Or,
        _ => Combinator::And,
    };
    let negate = caps.get(2).is_some() || caps.get(3).is_some();
    let base = caps.get(4).or_else(|| caps.get(5))?.as_str();
    let base_name = lcfirst(base);
    let evaluator = caps.get(6).map(|m| match m.as_str() {
        "If" => Evaluator::If,
        _ => Evaluator::BasedOn,
    });
    let return_condition_only = caps.get(7).is_some();
    let is_relation = is_relation_name(&base_name);

    Some(VirtualCallSpec {
        combinator,
        negate,
        base_name,
        evaluator,
        return_condition_only,
        is_relation,
    })
}

/// `withAuthor`, `WithAuthor` are relation names; `without` is not.
pub fn is_relation_name(name: &str) -> bool {
    RELATION_NAME.is_match(name)
}

/// A condition reference inside a raw condition: `name` or `name:arg1,arg2`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionReference {
    pub name: String,
    pub args: Vec<Value>,
}

impl ConditionReference {
    /// True for `withRelation...` references, which resolve through a relation.
    pub fn is_relation(&self) -> bool {
        RELATION_REFERENCE.is_match(&self.name)
    }
}

/// Splits `name:arg1,arg2`. Returns `None` for anything that is not a bare
/// word optionally followed by arguments (operators, raw SQL fragments).
pub fn parse_reference(token: &str) -> Option<ConditionReference> {
    let caps = REFERENCE_PATTERN.captures(token)?;
    let name = caps.get(1)?.as_str().to_string();
    let args = caps
        .get(2)
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|arg| Value::String(arg.to_string()))
                .collect()
        })
        .unwrap_or_default();
    Some(ConditionReference { name, args })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parsed(method: &str) -> VirtualCallSpec {
        parse_call(method).unwrap_or_else(|| panic!("{method} should parse"))
    }

    #[test]
    fn test_standalone_base() {
        let s = parsed("active");
        assert_eq!(s.combinator, Combinator::And);
        assert!(!s.negate);
        assert_eq!(s.base_name, "active");
        assert_eq!(s.evaluator, None);
        assert!(!s.return_condition_only);
        assert!(!s.is_relation);
    }

    #[test]
    fn test_full_modifier_chain() {
        let s = parsed("orNotActiveBasedOnCondition");
        assert_eq!(s.combinator, Combinator::Or);
        assert!(s.negate);
        assert_eq!(s.base_name, "active");
        assert_eq!(s.evaluator, Some(Evaluator::BasedOn));
        assert!(s.return_condition_only);
    }

    #[test]
    fn test_base_is_lowercased_first() {
        assert_eq!(parsed("andPublishedRecently").base_name, "publishedRecently");
    }

    #[test]
    fn test_relation_detection() {
        let s = parsed("andWithAuthorNameCondition");
        assert!(s.is_relation);
        assert_eq!(s.base_name, "withAuthorName");
        assert!(parsed("withAuthor").is_relation);
        assert!(!parsed("without").is_relation);
    }

    #[test]
    fn test_combinator_needs_capitalized_base() {
        // "order" is a standalone word, not "or" + "der".
        let s = parsed("orderedCondition");
        assert_eq!(s.combinator, Combinator::And);
        assert_eq!(s.base_name, "ordered");

        let s = parsed("notesIf");
        assert!(!s.negate);
        assert_eq!(s.base_name, "notes");
    }

    #[test]
    fn test_not_prefix_backtracks_into_base() {
        let s = parsed("andNoticeable");
        assert!(!s.negate);
        assert_eq!(s.base_name, "noticeable");
    }

    #[test]
    fn test_rejected_names() {
        assert!(parse_call("").is_none());
        assert!(parse_call("x").is_none());
        assert!(parse_call("Active").is_none());
        assert!(parse_call("andOr-").is_none());
        assert!(parse_call("with-author").is_none());
    }

    #[test]
    fn test_parsing_is_deterministic() {
        for name in ["orNotActiveIf", "withAuthorNameCondition", "notDeleted"] {
            assert_eq!(parse_call(name), parse_call(name));
        }
    }

    #[test]
    fn test_modifier_cross_product() {
        let combinators = [("", Combinator::And), ("and", Combinator::And), ("or", Combinator::Or)];
        let evaluators = [("", None), ("If", Some(Evaluator::If)), ("BasedOn", Some(Evaluator::BasedOn))];

        for (comb_text, comb) in combinators {
            for negate in [false, true] {
                for (eval_text, eval) in evaluators {
                    for suffix in [false, true] {
                        let prefix = match (comb_text, negate) {
                            ("", false) => "active".to_string(),
                            ("", true) => "notActive".to_string(),
                            (c, false) => format!("{c}Active"),
                            (c, true) => format!("{c}NotActive"),
                        };
                        let name = format!(
                            "{prefix}{eval_text}{}",
                            if suffix { "Condition" } else { "" }
                        );
                        let s = parsed(&name);
                        assert_eq!(s.combinator, comb, "{name}");
                        assert_eq!(s.negate, negate, "{name}");
                        assert_eq!(s.base_name, "active", "{name}");
                        assert_eq!(s.evaluator, eval, "{name}");
                        assert_eq!(s.return_condition_only, suffix, "{name}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_parse_reference_with_args() {
        let r = parse_reference("elems:1,2,3").unwrap();
        assert_eq!(r.name, "elems");
        assert_eq!(r.args, vec![json!("1"), json!("2"), json!("3")]);
        assert!(!r.is_relation());
    }

    #[test]
    fn test_parse_reference_without_args() {
        let r = parse_reference("active").unwrap();
        assert_eq!(r.name, "active");
        assert!(r.args.is_empty());
    }

    #[test]
    fn test_parse_reference_empty_arg_list() {
        let r = parse_reference("named:").unwrap();
        assert_eq!(r.args, vec![json!("")]);
    }

    #[test]
    fn test_parse_reference_rejects_operators_and_sql() {
        assert!(parse_reference(">=").is_none());
        assert!(parse_reference("a = b").is_none());
        assert!(parse_reference("orders.id").is_none());
    }

    #[test]
    fn test_relation_reference() {
        assert!(parse_reference("withAuthor:bob").unwrap().is_relation());
        assert!(!parse_reference("withauthor").unwrap().is_relation());
    }
}
