//! Classifies evaluator arguments as affirmative, negative or absent.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Significance {
    Affirmative,
    Negative,
    NonSignificant,
}

/// Strings are trimmed and numeric-looking strings compared as numbers.
/// `null` and the empty string carry no significance; `"0"`, `0` and
/// `false` are negative.
pub fn significance(value: &Value) -> Significance {
    let truthy = match value {
        Value::Null => return Significance::NonSignificant,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Significance::NonSignificant;
            }
            match s.parse::<f64>() {
                Ok(f) => f != 0.0,
                Err(_) => true,
            }
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    };

    if truthy {
        Significance::Affirmative
    } else {
        Significance::Negative
    }
}

/// Same as [`significance`], treating a missing argument as `null`.
pub fn significance_of(value: Option<&Value>) -> Significance {
    value.map_or(Significance::NonSignificant, significance)
}
