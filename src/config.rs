//! 配置模块，负责加载JSON配置文件
//!
//! - `SchemaMapping`: 记录类型 → 属性名 → 存储字段名
//! - `CompilerConfig`: 编译器运行参数

use crate::schema::FieldResolver;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {}", .0.display())]
    Missing(PathBuf),

    #[error("无法读取配置文件 {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("无法解析JSON配置文件 {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    // 检查文件是否存在
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }

    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// 字段映射配置结构
///
/// ```json
/// { "Person": { "Name": "name", "Age": "age" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaMapping {
    /// 记录类型 → (属性名 → 存储字段名)
    #[serde(flatten)]
    pub records: HashMap<String, HashMap<String, String>>,
}

impl SchemaMapping {
    /// 从JSON文件加载字段映射配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let content = read_config_file(path_ref)?;

        let records: HashMap<String, HashMap<String, String>> = serde_json::from_str(&content)
            .map_err(|source| ConfigError::Json {
                path: path_ref.to_path_buf(),
                source,
            })?;

        tracing::debug!(path = %path_ref.display(), records = records.len(), "loaded schema mapping");
        Ok(SchemaMapping { records })
    }

    /// 添加一个属性映射
    pub fn insert(
        &mut self,
        record_type: impl Into<String>,
        property: impl Into<String>,
        storage_name: impl Into<String>,
    ) -> &mut Self {
        self.records
            .entry(record_type.into())
            .or_default()
            .insert(property.into(), storage_name.into());
        self
    }

    /// 获取属性对应的存储字段名；未配置时返回 None
    pub fn get_field_name(&self, record_type: &str, property: &str) -> Option<&str> {
        self.records
            .get(record_type)
            .and_then(|fields| fields.get(property))
            .map(String::as_str)
    }

    /// 获取所有记录类型（已排序）
    pub fn record_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.records.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// 创建演示配置（用于测试或fallback）
    pub fn demo() -> Self {
        let mut mapping = Self::default();
        mapping
            .insert("Person", "Name", "name")
            .insert("Person", "Age", "age")
            .insert("Person", "Height", "height")
            .insert("Person", "Active", "is_active")
            .insert("Person", "Score", "score")
            .insert("Person", "Created", "created_at")
            .insert("Person", "Tier", "tier");
        mapping
    }
}

impl FieldResolver for SchemaMapping {
    fn resolve(&self, record_type: &str, property: &str) -> Option<String> {
        self.get_field_name(record_type, property).map(str::to_string)
    }
}

/// 编译器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// 谓词所针对的记录类型
    pub record_type: String,
    /// 字段映射文件；为空时使用演示配置
    pub schema_path: Option<PathBuf>,
    /// 搜索引擎过滤器是否执行扁平化
    pub flatten_search_filters: bool,
    /// 关系型预览使用的表名
    pub sql_table: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            record_type: "Person".to_string(),
            schema_path: None,
            flatten_search_filters: true,
            sql_table: "records".to_string(),
        }
    }
}

impl CompilerConfig {
    /// 从JSON文件加载编译器配置，缺失的字段使用默认值
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let content = read_config_file(path_ref)?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path_ref.to_path_buf(),
            source,
        })
    }

    /// 加载字段映射：优先使用 `schema_path`，否则使用演示配置
    pub fn load_schema(&self) -> Result<SchemaMapping, ConfigError> {
        match &self.schema_path {
            Some(path) => SchemaMapping::from_json_file(path),
            None => Ok(SchemaMapping::demo()),
        }
    }
}
