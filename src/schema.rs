//! Model registry and the sea-query backed [`ModelQuery`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use sea_query::{Asterisk, ConditionalStatement, Expr, Query, SelectStatement, SimpleExpr};
use serde_json::Value;

use crate::ast::{Combinator, ProcessedCondition, RawCondition};
use crate::auth::{ConditionToken, TokenCell};
use crate::config::{link_pairs, CompilerConfig, SchemaConfig};
use crate::error::{ConditionError, ConfigError, Result};
use crate::source::{ConditionSource, LinkPair, Pivot, RelationMetadata};
use crate::sql_compiler::{build_sql, column_ref, compile_condition, TableName};

/// Condition available on every model: filter by primary key.
pub const ELEMS_CONDITION: &str = "elems";

static NON_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\D+").expect("static pattern"));

pub type ConditionFn = Arc<dyn Fn(&ModelQuery, &[Value]) -> Result<RawCondition> + Send + Sync>;

#[derive(Clone)]
pub enum ConditionDef {
    /// JSON raw condition; `"$N"` strings are replaced by the N-th argument.
    Template(Value),
    Builder(ConditionFn),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PivotDef {
    /// Another relation of the same model.
    Relation(String),
    /// A table without a model of its own.
    Table { table: String, link: Vec<LinkPair> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationDef {
    pub model: String,
    pub link: Vec<LinkPair>,
    pub pivot: Option<PivotDef>,
}

impl RelationDef {
    /// `foreign` is the column on the related model, `local` the one on this model.
    pub fn new(model: impl Into<String>, foreign: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            link: vec![LinkPair::new(foreign, local)],
            pivot: None,
        }
    }

    pub fn via(mut self, relation: impl Into<String>) -> Self {
        self.pivot = Some(PivotDef::Relation(relation.into()));
        self
    }

    /// `foreign` lives on the pivot table, `local` on this model.
    pub fn via_table(
        mut self,
        table: impl Into<String>,
        foreign: impl Into<String>,
        local: impl Into<String>,
    ) -> Self {
        self.pivot = Some(PivotDef::Table {
            table: table.into(),
            link: vec![LinkPair::new(foreign, local)],
        });
        self
    }
}

pub struct ModelDef {
    name: String,
    table: String,
    primary_key: String,
    conditions: HashMap<String, ConditionDef>,
    relations: HashMap<String, RelationDef>,
    token: TokenCell,
}

impl ModelDef {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".to_string(),
            conditions: HashMap::new(),
            relations: HashMap::new(),
            token: TokenCell::new(),
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn condition(mut self, name: impl Into<String>, template: Value) -> Self {
        self.conditions.insert(name.into(), ConditionDef::Template(template));
        self
    }

    pub fn condition_fn<F>(mut self, name: impl Into<String>, build: F) -> Self
    where
        F: Fn(&ModelQuery, &[Value]) -> Result<RawCondition> + Send + Sync + 'static,
    {
        self.conditions.insert(name.into(), ConditionDef::Builder(Arc::new(build)));
        self
    }

    pub fn relation(mut self, name: impl Into<String>, relation: RelationDef) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ModelDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut conditions: Vec<_> = self.conditions.keys().collect();
        conditions.sort();
        f.debug_struct("ModelDef")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("conditions", &conditions)
            .field("relations", &self.relations)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Schema {
    config: CompilerConfig,
    models: HashMap<String, Arc<ModelDef>>,
}

impl Schema {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            models: HashMap::new(),
        }
    }

    pub fn with_model(mut self, model: ModelDef) -> Self {
        self.models.insert(model.name.clone(), Arc::new(model));
        self
    }

    pub fn from_config(config: SchemaConfig) -> std::result::Result<Self, ConfigError> {
        let mut schema = Schema::new(config.compiler);
        for (name, model) in config.models {
            let mut def = ModelDef::new(&name, model.table).primary_key(model.primary_key);
            for (condition, template) in model.conditions {
                def = def.condition(condition, template);
            }
            for (relation_name, relation) in model.relations {
                let context = format!("{name}.{relation_name}");
                let pivot = match (relation.via, relation.via_table) {
                    (Some(via), _) => Some(PivotDef::Relation(via)),
                    (None, Some(via_table)) => Some(PivotDef::Table {
                        table: via_table.table,
                        link: link_pairs(&via_table.link, &context)?,
                    }),
                    (None, None) => None,
                };
                def = def.relation(
                    relation_name,
                    RelationDef {
                        model: relation.model,
                        link: link_pairs(&relation.link, &context)?,
                        pivot,
                    },
                );
            }
            schema = schema.with_model(def);
        }
        Ok(schema)
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.models.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    /// A query over every row of `model`.
    pub fn query(self: &Arc<Self>, model: &str) -> Result<ModelQuery> {
        let model = self
            .models
            .get(model)
            .cloned()
            .ok_or_else(|| ConditionError::UnknownModel(model.to_string()))?;
        Ok(ModelQuery {
            schema: Arc::clone(self),
            model,
            filter: None,
        })
    }

    fn table_query(self: &Arc<Self>, table: &str) -> ModelQuery {
        ModelQuery {
            schema: Arc::clone(self),
            model: Arc::new(ModelDef::new(table, table)),
            filter: None,
        }
    }
}

/// An immutable query over one model; filters are accumulated as a single expression.
#[derive(Clone)]
pub struct ModelQuery {
    schema: Arc<Schema>,
    model: Arc<ModelDef>,
    filter: Option<SimpleExpr>,
}

impl ModelQuery {
    pub fn model(&self) -> &ModelDef {
        &self.model
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    pub fn build(&self) -> SelectStatement {
        Query::select()
            .column(Asterisk)
            .from(TableName(self.model.table.clone()))
            .and_where_option(self.filter.clone())
            .to_owned()
    }

    pub fn to_sql(&self) -> String {
        build_sql(&self.build(), self.schema.config.backend)
    }

    fn with_filter(&self, expr: SimpleExpr, combinator: Combinator) -> Self {
        let filter = match (self.filter.clone(), combinator) {
            (None, _) => expr,
            (Some(current), Combinator::And) => current.and(expr),
            (Some(current), Combinator::Or) => current.or(expr),
        };
        Self {
            filter: Some(filter),
            ..self.clone()
        }
    }

    fn elems_condition(&self, args: &[Value]) -> RawCondition {
        let mut ids = Vec::new();
        for arg in args {
            match arg {
                Value::Array(items) => ids.extend(items.iter().cloned().map(RawCondition::Literal)),
                Value::String(s) => ids.extend(
                    NON_DIGITS
                        .split(s)
                        .filter(|piece| !piece.is_empty())
                        .map(|piece| match piece.parse::<i64>() {
                            Ok(id) => RawCondition::Literal(Value::from(id)),
                            // wider than i64
                            Err(_) => RawCondition::Literal(Value::String(piece.to_string())),
                        }),
                ),
                Value::Null => {}
                other => ids.push(RawCondition::Literal(other.clone())),
            }
        }
        let column = format!("{}.{}", self.model.table, self.model.primary_key);
        RawCondition::map([(column, RawCondition::List(ids))])
    }
}

impl fmt::Debug for ModelQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelQuery")
            .field("model", &self.model.name)
            .field("sql", &self.to_sql())
            .finish()
    }
}

/// Replaces every `"$N"` string by the N-th argument, `null` when absent.
fn substitute_args(template: &Value, args: &[Value]) -> Value {
    match template {
        Value::String(s) => match s.strip_prefix('$').and_then(|n| n.parse::<usize>().ok()) {
            Some(index) => args.get(index).cloned().unwrap_or(Value::Null),
            None => template.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_args(v, args)).collect()),
        Value::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), substitute_args(v, args)))
                .collect(),
        ),
        other => other.clone(),
    }
}

impl ConditionSource for ModelQuery {
    fn exists_condition(&self, name: &str) -> bool {
        self.model.conditions.contains_key(name) || name == ELEMS_CONDITION
    }

    fn raw_condition(&self, name: &str, args: &[Value], token: &ConditionToken) -> Result<RawCondition> {
        if !self.model.token.verify(token) {
            return Err(ConditionError::AuthorizationMismatch {
                condition: name.to_string(),
            });
        }
        match self.model.conditions.get(name) {
            Some(ConditionDef::Template(template)) => {
                Ok(RawCondition::from_json(substitute_args(template, args)))
            }
            Some(ConditionDef::Builder(build)) => build(self, args),
            None if name == ELEMS_CONDITION => Ok(self.elems_condition(args)),
            None => Err(ConditionError::UnresolvedReference(name.to_string())),
        }
    }

    fn conditions_token(&self) -> ConditionToken {
        self.model.token.get()
    }

    fn table_name(&self) -> &str {
        &self.model.table
    }

    fn primary_key(&self) -> &str {
        &self.model.primary_key
    }

    fn has_relation(&self, name: &str) -> bool {
        self.model.relations.contains_key(name)
    }

    fn relation(&self, name: &str) -> Result<Option<RelationMetadata<Self>>> {
        let Some(def) = self.model.relations.get(name) else {
            return Ok(None);
        };
        let target = self.schema.query(&def.model)?;
        let pivot = match &def.pivot {
            None => None,
            Some(PivotDef::Relation(via)) => {
                let via_def = self.model.relations.get(via).ok_or_else(|| {
                    ConditionError::MalformedCompoundLink {
                        relation: name.to_string(),
                    }
                })?;
                Some(Pivot {
                    query: self.schema.query(&via_def.model)?,
                    link: via_def.link.clone(),
                })
            }
            Some(PivotDef::Table { table, link }) => Some(Pivot {
                query: self.schema.table_query(table),
                link: link.clone(),
            }),
        };
        Ok(Some(RelationMetadata {
            target,
            link: def.link.clone(),
            pivot,
        }))
    }

    fn select_column(&self, column: &str) -> SelectStatement {
        Query::select()
            .column(column_ref(column))
            .from(TableName(self.model.table.clone()))
            .and_where_option(self.filter.clone())
            .to_owned()
    }

    fn merge_where(&self, condition: &ProcessedCondition, combinator: Combinator) -> Result<Self> {
        Ok(match compile_condition(condition)? {
            Some(expr) => self.with_filter(expr, combinator),
            None => self.clone(),
        })
    }

    fn and_where_raw(&self, fragment: &str) -> Self {
        self.with_filter(Expr::cust(fragment), Combinator::And)
    }

    fn max_expansion_depth(&self) -> usize {
        self.schema.config.max_expansion_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Conditions;
    use crate::test_fixtures::shop;
    use serde_json::json;

    #[test]
    fn test_unknown_model() {
        let schema = shop();
        assert!(matches!(schema.query("Nope"), Err(ConditionError::UnknownModel(_))));
    }

    #[test]
    fn test_raw_condition_requires_matching_token() {
        let schema = shop();
        let posts = schema.query("Post").unwrap();
        let authors = schema.query("Author").unwrap();

        assert!(posts.raw_condition("published", &[], &posts.conditions_token()).is_ok());
        assert_eq!(
            posts
                .raw_condition("published", &[], &authors.conditions_token())
                .unwrap_err(),
            ConditionError::AuthorizationMismatch {
                condition: "published".to_string()
            }
        );
    }

    #[test]
    fn test_token_is_per_model_and_stable() {
        let schema = shop();
        let a = schema.query("Post").unwrap();
        let b = schema.query("Post").unwrap();
        assert_eq!(a.conditions_token(), b.conditions_token());
    }

    #[test]
    fn test_template_argument_substitution() {
        let schema = shop();
        let authors = schema.query("Author").unwrap();
        let raw = authors
            .raw_condition("name", &[json!("ada")], &authors.conditions_token())
            .unwrap();
        match raw {
            RawCondition::Map(entries) => {
                assert_eq!(entries[0].0, "authors.name");
                assert!(matches!(&entries[0].1, RawCondition::Name(n) if n == "ada"));
            }
            other => panic!("Expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_template_argument_is_null() {
        assert_eq!(substitute_args(&json!({"a": "$1"}), &[json!(1)]), json!({"a": null}));
        assert_eq!(substitute_args(&json!(["$x", "$0"]), &[json!(2)]), json!(["$x", 2]));
    }

    #[test]
    fn test_elems_condition() {
        let schema = shop();
        let posts = schema.query("Post").unwrap();
        assert!(posts.exists_condition(ELEMS_CONDITION));

        let raw = posts
            .raw_condition(
                ELEMS_CONDITION,
                &[json!("1, 2;3"), json!([4]), json!(5)],
                &posts.conditions_token(),
            )
            .unwrap();
        let RawCondition::Map(entries) = raw else {
            panic!("Expected map");
        };
        assert_eq!(entries[0].0, "posts.id");
        let RawCondition::List(ids) = &entries[0].1 else {
            panic!("Expected id list");
        };
        let ids: Vec<_> = ids
            .iter()
            .map(|id| match id {
                RawCondition::Literal(v) => v.clone(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
    }

    #[test]
    fn test_elems_keeps_oversized_ids() {
        let schema = shop();
        let posts = schema.query("Post").unwrap();
        let raw = posts
            .raw_condition(
                ELEMS_CONDITION,
                &[json!("7,99999999999999999999999")],
                &posts.conditions_token(),
            )
            .unwrap();
        let RawCondition::Map(entries) = raw else {
            panic!("Expected map");
        };
        let RawCondition::List(ids) = &entries[0].1 else {
            panic!("Expected id list");
        };
        assert_eq!(ids.len(), 2);
        assert!(matches!(&ids[0], RawCondition::Literal(v) if *v == json!(7)));
        assert!(matches!(&ids[1], RawCondition::Literal(v) if *v == json!("99999999999999999999999")));

        let sql = posts
            .call_condition("andElems", &[json!("7,99999999999999999999999")])
            .unwrap()
            .into_query()
            .unwrap()
            .to_sql();
        assert!(sql.contains(r#""posts"."id" IN (7, '99999999999999999999999')"#), "{sql}");
    }

    #[test]
    fn test_merge_where_combinators() {
        let schema = shop();
        let posts = schema.query("Post").unwrap();
        let a = ProcessedCondition::map([("posts.status", "active".into())]);
        let b = ProcessedCondition::map([("posts.votes", ProcessedCondition::Value(json!(3)))]);

        let sql = posts
            .merge_where(&a, Combinator::Or)
            .unwrap()
            .merge_where(&b, Combinator::Or)
            .unwrap()
            .to_sql();
        assert!(sql.contains(r#""posts"."status" = 'active' OR "posts"."votes" = 3"#), "{sql}");
        assert!(!posts.has_filter());
    }

    #[test]
    fn test_merge_empty_condition_keeps_query() {
        let schema = shop();
        let posts = schema.query("Post").unwrap();
        let merged = posts.merge_where(&ProcessedCondition::empty(), Combinator::And).unwrap();
        assert!(!merged.has_filter());
    }

    #[test]
    fn test_relation_metadata() {
        let schema = shop();
        let orders = schema.query("Order").unwrap();

        let items = orders.relation("items").unwrap().unwrap();
        assert_eq!(items.target.table_name(), "order_items");
        assert!(items.pivot.is_none());

        let products = orders.relation("products").unwrap().unwrap();
        assert_eq!(products.target.table_name(), "products");
        let pivot = products.pivot.unwrap();
        assert_eq!(pivot.query.table_name(), "order_items");
        assert_eq!(pivot.link, vec![LinkPair::new("order_id", "id")]);

        assert!(orders.relation("nothing").unwrap().is_none());
    }

    #[test]
    fn test_via_table_pivot() {
        let schema = shop();
        let posts = schema.query("Post").unwrap();
        let tags = posts.relation("tags").unwrap().unwrap();
        let pivot = tags.pivot.unwrap();
        assert_eq!(pivot.query.table_name(), "post_tags");
        assert_eq!(pivot.query.primary_key(), "id");
    }

    #[test]
    fn test_select_column_carries_filter() {
        let schema = shop();
        let posts = schema
            .query("Post")
            .unwrap()
            .and_where_raw("posts.votes > 1");
        let select = posts.select_column("posts.author_id");
        let sql = build_sql(&select, schema.config().backend);
        assert!(sql.starts_with(r#"SELECT "posts"."author_id" FROM "posts" WHERE posts.votes > 1"#), "{sql}");
    }

    #[test]
    fn test_from_config() {
        let config = SchemaConfig::from_json_str(
            r#"{ "models": {
                "Post": { "table": "posts",
                    "conditions": { "published": { "posts.status": "published" } },
                    "relations": { "tags": { "model": "Tag", "link": { "id": "tag_id" },
                        "via_table": { "table": "post_tags", "link": { "post_id": "id" } } } } },
                "Tag": { "table": "tags" } } }"#,
        )
        .unwrap();
        let schema = Arc::new(Schema::from_config(config).unwrap());
        assert_eq!(schema.model_names(), vec!["Post", "Tag"]);

        let posts = schema.query("Post").unwrap();
        assert!(posts.exists_condition("published"));
        let tags = posts.relation("tags").unwrap().unwrap();
        assert_eq!(tags.pivot.unwrap().link, vec![LinkPair::new("post_id", "id")]);
    }
}
