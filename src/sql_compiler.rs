//! Compiles processed condition trees into sea-query expressions.
//!
//! Supported shapes:
//! - hash: `{column: value}` (`null` -> `IS NULL`, list -> `IN`, sub-query -> `IN (SELECT ...)`)
//! - operator: `[op, operand...]` for `and`, `or`, `not`, `in`, `not in`,
//!   `between`, `not between`, `like`, `not like`, `exists`, `not exists`
//!   and the comparison operators
//! - a bare string, taken as a raw SQL fragment

use sea_query::{
    ColumnRef, Expr, IntoColumnRef, Iden, MysqlQueryBuilder, PostgresQueryBuilder, SelectStatement,
    SimpleExpr, SqliteQueryBuilder, Value,
};

use crate::ast::ProcessedCondition;
use crate::config::Backend;
use crate::error::{ConditionError, Result};

/// Table identifier for sea-query
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// Resolves `table.column` (optionally back-tick or double-quote quoted) into a column reference.
pub fn column_ref(name: &str) -> ColumnRef {
    let unquote = |part: &str| part.trim().trim_matches(|c| c == '`' || c == '"').to_string();
    match name.rsplit_once('.') {
        Some((table, column)) => {
            (TableName(unquote(table)), ColumnName(unquote(column))).into_column_ref()
        }
        None => ColumnName(unquote(name)).into_column_ref(),
    }
}

/// Renders a select statement for the configured backend.
pub fn build_sql(select: &SelectStatement, backend: Backend) -> String {
    match backend {
        Backend::Postgres => select.to_string(PostgresQueryBuilder),
        Backend::MySql => select.to_string(MysqlQueryBuilder),
        Backend::Sqlite => select.to_string(SqliteQueryBuilder),
    }
}

/// Compile a processed condition. `None` means the condition is empty and
/// imposes no filter.
pub fn compile_condition(condition: &ProcessedCondition) -> Result<Option<SimpleExpr>> {
    match condition {
        ProcessedCondition::Map(entries) => {
            let conditions = entries
                .iter()
                .map(|(column, value)| compile_hash_entry(column, value))
                .collect::<Result<Vec<_>>>()?;
            Ok(combine_conditions_with_and(conditions))
        }
        ProcessedCondition::List(items) => match items.split_first() {
            None => Ok(None),
            Some((ProcessedCondition::Operand(op), operands)) => {
                compile_operator(&op.to_lowercase(), operands)
            }
            Some(_) => Err(malformed("operator condition must start with an operator")),
        },
        ProcessedCondition::Operand(fragment) if fragment.trim().is_empty() => Ok(None),
        ProcessedCondition::Operand(fragment) => Ok(Some(Expr::cust(fragment.clone()))),
        ProcessedCondition::Value(serde_json::Value::Null) => Ok(None),
        ProcessedCondition::Value(serde_json::Value::Bool(b)) => Ok(Some(Expr::val(*b).into())),
        ProcessedCondition::Value(other) => Err(malformed(format!("{other} is not a condition"))),
        ProcessedCondition::SubQuery(_) => Err(malformed("a sub-query needs a column to compare with")),
    }
}

/// `column => value`
fn compile_hash_entry(column: &str, value: &ProcessedCondition) -> Result<SimpleExpr> {
    let col = Expr::col(column_ref(column));
    let expr = match value {
        ProcessedCondition::Value(serde_json::Value::Null) => col.is_null(),
        ProcessedCondition::List(items) if items.is_empty() => Expr::val(false).into(),
        ProcessedCondition::List(items) => {
            let values = items.iter().map(scalar_value).collect::<Result<Vec<_>>>()?;
            col.is_in(values)
        }
        ProcessedCondition::SubQuery(select) => col.in_subquery(select.as_ref().clone()),
        ProcessedCondition::Map(_) => {
            return Err(malformed(format!("nested hash condition under `{column}`")))
        }
        scalar => col.eq(scalar_value(scalar)?),
    };
    Ok(expr)
}

fn compile_operator(op: &str, operands: &[ProcessedCondition]) -> Result<Option<SimpleExpr>> {
    let expr = match op {
        "and" | "or" => {
            let parts = operands
                .iter()
                .map(compile_condition)
                .collect::<Result<Vec<_>>>()?;
            let parts = parts.into_iter().flatten();
            return Ok(if op == "and" {
                parts.reduce(|acc, expr| acc.and(expr))
            } else {
                parts.reduce(|acc, expr| acc.or(expr))
            });
        }
        "not" => {
            let [inner] = operands else {
                return Err(malformed("`not` takes exactly one operand"));
            };
            return Ok(compile_condition(inner)?.map(SimpleExpr::not));
        }
        "in" | "not in" => {
            let [column, values] = operands else {
                return Err(malformed(format!("`{op}` takes a column and a value list")));
            };
            let col = Expr::col(column_ref(operand_name(column)?));
            match (values, op) {
                (ProcessedCondition::SubQuery(select), "in") => col.in_subquery(select.as_ref().clone()),
                (ProcessedCondition::SubQuery(select), _) => col.not_in_subquery(select.as_ref().clone()),
                (values, _) => {
                    let values = value_list(values)?;
                    if op == "in" {
                        col.is_in(values)
                    } else {
                        col.is_not_in(values)
                    }
                }
            }
        }
        "between" | "not between" => {
            let [column, low, high] = operands else {
                return Err(malformed(format!("`{op}` takes a column and two bounds")));
            };
            let col = Expr::col(column_ref(operand_name(column)?));
            let (low, high) = (scalar_value(low)?, scalar_value(high)?);
            if op == "between" {
                col.between(low, high)
            } else {
                col.not_between(low, high)
            }
        }
        "like" | "not like" => {
            let [column, pattern] = operands else {
                return Err(malformed(format!("`{op}` takes a column and a pattern")));
            };
            let col = Expr::col(column_ref(operand_name(column)?));
            let pattern = operand_name(pattern)?.to_string();
            if op == "like" {
                col.like(pattern)
            } else {
                col.not_like(pattern)
            }
        }
        "exists" | "not exists" => {
            let [ProcessedCondition::SubQuery(select)] = operands else {
                return Err(malformed(format!("`{op}` takes a single sub-query")));
            };
            let exists = Expr::exists(select.as_ref().clone());
            if op == "exists" {
                exists
            } else {
                exists.not()
            }
        }
        "=" | "!=" | "<>" | ">" | "<" | ">=" | "<=" => {
            let [column, value] = operands else {
                return Err(malformed(format!("`{op}` takes a column and a value")));
            };
            let col = Expr::col(column_ref(operand_name(column)?));
            let val = scalar_value(value)?;
            match op {
                "=" => col.eq(val),
                "!=" | "<>" => col.ne(val),
                ">" => col.gt(val),
                "<" => col.lt(val),
                ">=" => col.gte(val),
                _ => col.lte(val),
            }
        }
        other => return Err(malformed(format!("unknown operator `{other}`"))),
    };
    Ok(Some(expr))
}

/// Combine multiple conditions with AND
fn combine_conditions_with_and(conditions: Vec<SimpleExpr>) -> Option<SimpleExpr> {
    conditions.into_iter().reduce(|acc, expr| acc.and(expr))
}

fn operand_name(operand: &ProcessedCondition) -> Result<&str> {
    match operand {
        ProcessedCondition::Operand(name) => Ok(name),
        other => Err(malformed(format!("expected a name, found {other:?}"))),
    }
}

fn value_list(values: &ProcessedCondition) -> Result<Vec<Value>> {
    match values {
        ProcessedCondition::List(items) => items.iter().map(scalar_value).collect(),
        scalar => Ok(vec![scalar_value(scalar)?]),
    }
}

fn scalar_value(value: &ProcessedCondition) -> Result<Value> {
    match value {
        ProcessedCondition::Operand(s) => Ok(Value::String(Some(Box::new(s.clone())))),
        ProcessedCondition::Value(v) => json_to_value(v),
        other => Err(malformed(format!("expected a scalar value, found {other:?}"))),
    }
}

/// Convert a JSON scalar to a sea-query Value
fn json_to_value(value: &serde_json::Value) -> Result<Value> {
    match value {
        serde_json::Value::Bool(b) => Ok(Value::Bool(Some(*b))),
        serde_json::Value::String(s) => Ok(Value::String(Some(Box::new(s.clone())))),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::BigInt(Some(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::BigUnsigned(Some(u)))
            } else {
                Ok(Value::Double(n.as_f64()))
            }
        }
        other => Err(malformed(format!("{other} is not a scalar"))),
    }
}

fn malformed(message: impl Into<String>) -> ConditionError {
    ConditionError::MalformedCondition(message.into())
}
