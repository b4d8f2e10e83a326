//! Virtual condition methods for query builders.
//!
//! A call such as `andNotActiveIf(flag)` or `withAuthorNameCondition("ada")` is
//! parsed into a [`ast::VirtualCallSpec`], its named conditions are expanded
//! recursively, and the result is either merged into a derived query or handed
//! back as a [`ast::ProcessedCondition`].

pub mod ast;
pub mod auth;
pub mod config;
pub mod error;
pub mod expander;
pub mod handler;
pub mod lexer;
pub mod parser;
pub mod relation;
pub mod renderer;
pub mod schema;
pub mod significance;
pub mod source;
pub mod sql_compiler;
pub mod token;

#[cfg(test)]
mod test_fixtures;

pub use ast::{Combinator, ConditionOptions, ProcessedCondition, RawCondition};
pub use config::{Backend, CompilerConfig, SchemaConfig};
pub use error::{ConditionError, ConfigError};
pub use handler::{Conditions, ConditionsHandler, Outcome};
pub use schema::{ModelDef, ModelQuery, RelationDef, Schema};
pub use source::ConditionSource;
