use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use condition_dispatcher::{
    CompilerConfig, Conditions, ModelDef, ModelQuery, Outcome, RelationDef, Schema, SchemaConfig,
};

const SCHEMA_PATH: &str = "demos/shop_schema.json";

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "condition_dispatcher=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize tracing: {}", e))?;
    Ok(())
}

/// 创建模型注册表，优先使用JSON配置，失败时使用内置模型
fn load_schema() -> Arc<Schema> {
    match SchemaConfig::from_json_file(SCHEMA_PATH).and_then(Schema::from_config) {
        Ok(schema) => {
            info!(path = SCHEMA_PATH, "loaded schema");
            Arc::new(schema)
        }
        Err(e) => {
            warn!(path = SCHEMA_PATH, error = %e, "falling back to built-in schema");
            Arc::new(builtin_schema())
        }
    }
}

fn builtin_schema() -> Schema {
    Schema::new(CompilerConfig::default())
        .with_model(
            ModelDef::new("Post", "posts")
                .condition("active", json!({"posts.status": "active"}))
                .condition("popular", json!([">", "posts.votes", "$0"]))
                .relation("author", RelationDef::new("Author", "id", "author_id")),
        )
        .with_model(
            ModelDef::new("Author", "authors").condition("name", json!({"authors.name": "$0"})),
        )
}

/// `<Model> <method> [json args...]`
fn parse_line(line: &str) -> Result<(&str, &str, Vec<Value>)> {
    let mut parts = line.trim().splitn(3, char::is_whitespace);
    let model = parts.next().filter(|s| !s.is_empty()).context("missing model")?;
    let method = parts.next().context("missing method")?;
    let args = serde_json::Deserializer::from_str(parts.next().unwrap_or_default())
        .into_iter::<Value>()
        .collect::<Result<Vec<_>, _>>()
        .context("arguments must be JSON values")?;
    Ok((model, method, args))
}

fn eval(schema: &Arc<Schema>, line: &str) -> Result<String> {
    let (model, method, args) = parse_line(line)?;
    let query: ModelQuery = schema.query(model)?;

    if method == "where" {
        let [raw] = args.as_slice() else {
            bail!("`where` takes one JSON condition");
        };
        let query = query.and_where_condition(condition_dispatcher::RawCondition::from_json(raw.clone()))?;
        return Ok(query.to_sql());
    }

    Ok(match query.call_condition(method, &args)? {
        Outcome::Query(query) => query.to_sql(),
        Outcome::Condition(condition) => format!("{condition:#?}"),
        Outcome::NotApplicable => format!("`{method}` is not a condition of {}", query.model().name()),
    })
}

fn main() -> Result<()> {
    init_tracing()?;
    let schema = load_schema();

    println!("--- Condition Dispatcher ---");
    println!("模型: {}", schema.model_names().join(", "));
    println!("输入 `<Model> <method> [json args...]`, 例如: Post andWithAuthorName \"ada\"");

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == ":quit" || line == ":q" {
                    break;
                }
                if let Err(e) = editor.add_history_entry(line) {
                    warn!(error = %e, "failed to record history entry");
                }
                match eval(&schema, line) {
                    Ok(output) => println!("{output}"),
                    Err(e) => println!("✗ {e}"),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let (model, method, args) = parse_line(r#"Post popularIf true "10""#).unwrap();
        assert_eq!(model, "Post");
        assert_eq!(method, "popularIf");
        assert_eq!(args, vec![json!(true), json!("10")]);

        let (_, _, args) = parse_line("Order withProducts {\"sku\": \"X 1\"}").unwrap();
        assert_eq!(args, vec![json!({"sku": "X 1"})]);

        assert!(parse_line("Post").is_err());
        assert!(parse_line("Post active nope").is_err());
    }

    #[test]
    fn test_eval_builtin_schema() {
        let schema = Arc::new(builtin_schema());
        let sql = eval(&schema, r#"Post andWithAuthorName "ada""#).unwrap();
        assert!(sql.contains(r#""authors"."name" = 'ada'"#), "{sql}");

        let sql = eval(&schema, r#"Post where ["and", "active", "popular:3"]"#).unwrap();
        assert!(sql.contains(r#""posts"."status" = 'active'"#), "{sql}");

        assert!(eval(&schema, "Post andArchived").unwrap().contains("not a condition of Post"));
        assert!(eval(&schema, "Nope active").is_err());
    }
}
