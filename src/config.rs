//! 应用运行配置加载。

use std::env;
use std::path::PathBuf;

use crate::complexity::{ScoringConfig, ScoringSettings};
use crate::complexity::DEFAULT_MAX_DEPTH;
use crate::error::ConfigurationError;

/// 默认信标注册表路径
pub const DEFAULT_BEACON_CONFIG: &str = "FloorPlan/beacon-config.json";

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scoring settings: {0}")]
    Scoring(#[from] ConfigurationError),
}

/// 应用运行配置。
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub beacon_config_path: PathBuf,
    pub scoring_settings_path: Option<PathBuf>,
    pub max_tree_depth: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            beacon_config_path: PathBuf::from(DEFAULT_BEACON_CONFIG),
            scoring_settings_path: None,
            max_tree_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let beacon_config_path = env::var("SHOPNAV_BEACON_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_BEACON_CONFIG));
        let scoring_settings_path = read_optional("SHOPNAV_SCORING_SETTINGS").map(PathBuf::from);
        let max_tree_depth = read_usize_with_default("SHOPNAV_MAX_TREE_DEPTH", DEFAULT_MAX_DEPTH)?;
        if max_tree_depth == 0 {
            return Err(ConfigError::Invalid(
                "SHOPNAV_MAX_TREE_DEPTH".to_string(),
                max_tree_depth.to_string(),
            ));
        }

        Ok(Self {
            beacon_config_path,
            scoring_settings_path,
            max_tree_depth,
        })
    }

    /// 加载评分配置：未配置路径时使用内置默认值。
    pub async fn load_scoring_config(&self) -> Result<ScoringConfig, ConfigError> {
        let Some(path) = &self.scoring_settings_path else {
            return Ok(ScoringConfig::default());
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
        Ok(ScoringSettings::from_json(&raw)?.into_config()?)
    }
}

fn read_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}
