//! 配置模块，负责加载JSON配置文件

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::source::{LinkPair, DEFAULT_MAX_EXPANSION_DEPTH};

/// SQL dialect used when rendering queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backend {
    #[default]
    #[serde(rename = "postgres")]
    Postgres,
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "sqlite")]
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub backend: Backend,
    /// Nesting limit for condition references before expansion gives up.
    pub max_expansion_depth: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Postgres,
            max_expansion_depth: DEFAULT_MAX_EXPANSION_DEPTH,
        }
    }
}

/// JSON object of `foreign column => local column`.
pub type LinkConfig = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViaTableConfig {
    pub table: String,
    pub link: LinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationConfig {
    /// Name of the related model.
    pub model: String,
    pub link: LinkConfig,
    /// Another relation of the same model acting as pivot.
    #[serde(default)]
    pub via: Option<String>,
    /// A plain pivot table.
    #[serde(default)]
    pub via_table: Option<ViaTableConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Condition templates; `"$N"` strings are replaced by the N-th argument.
    #[serde(default)]
    pub conditions: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub relations: BTreeMap<String, RelationConfig>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

/// 模型与关联配置结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub compiler: CompilerConfig,
    pub models: BTreeMap<String, ModelConfig>,
}

impl SchemaConfig {
    /// 从JSON文件加载模型配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_ref.display().to_string()));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;

        Self::from_json_str(&content).map_err(|e| match e {
            ConfigError::Json { source, .. } => ConfigError::Json {
                path: path_ref.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: SchemaConfig = serde_json::from_str(content).map_err(|source| ConfigError::Json {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (model_name, model) in &self.models {
            for (relation_name, relation) in &model.relations {
                let context = format!("{model_name}.{relation_name}");
                if !self.models.contains_key(&relation.model) {
                    return Err(ConfigError::Invalid(format!(
                        "{context} refers to unknown model `{}`",
                        relation.model
                    )));
                }
                if relation.via.is_some() && relation.via_table.is_some() {
                    return Err(ConfigError::Invalid(format!(
                        "{context} declares both `via` and `via_table`"
                    )));
                }
                if let Some(via) = &relation.via {
                    if !model.relations.contains_key(via) {
                        return Err(ConfigError::Invalid(format!(
                            "{context} goes via unknown relation `{via}`"
                        )));
                    }
                }
                link_pairs(&relation.link, &context)?;
                if let Some(via_table) = &relation.via_table {
                    link_pairs(&via_table.link, &context)?;
                }
            }
        }
        Ok(())
    }
}

/// Reads a link object in declaration order.
pub fn link_pairs(link: &LinkConfig, context: &str) -> Result<Vec<LinkPair>, ConfigError> {
    link.iter()
        .map(|(foreign, local)| match local {
            serde_json::Value::String(local) => Ok(LinkPair::new(foreign, local)),
            other => Err(ConfigError::Invalid(format!(
                "{context}: link column for `{foreign}` must be a string, found {other}"
            ))),
        })
        .collect()
}
