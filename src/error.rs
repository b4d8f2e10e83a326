//! Error types for condition compilation and schema loading.

use thiserror::Error;

/// Errors raised while compiling a condition call.
///
/// Name-grammar mismatches, unknown conditions and unresolved relations are
/// not errors: they surface as [`Outcome::NotApplicable`](crate::handler::Outcome).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    /// The caller presented a token that does not belong to the query's model.
    #[error("authorization token mismatch while reading condition `{condition}`")]
    AuthorizationMismatch { condition: String },

    /// A direct relation declares no foreign/local column pair.
    #[error("relation `{relation}` has no link columns")]
    MalformedLink { relation: String },

    /// A pivot relation is missing its intermediate link.
    #[error("pivot of relation `{relation}` has no link columns")]
    MalformedCompoundLink { relation: String },

    /// A relation points at a model that is not registered.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// The processed tree cannot be expressed as SQL.
    #[error("malformed condition: {0}")]
    MalformedCondition(String),

    /// Condition definitions keep referencing each other.
    #[error("expansion of `{name}` exceeded the maximum depth of {depth}")]
    ExpansionDepthExceeded { name: String, depth: usize },

    /// A relation reference inside a raw condition did not resolve.
    #[error("unresolved condition reference: {0}")]
    UnresolvedReference(String),
}

/// Errors raised while loading a schema configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid schema: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConditionError>;
