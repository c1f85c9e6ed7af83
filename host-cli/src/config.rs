//! # Config 模块
//!
//! 宿主配置，集中管理所有配置项。
//!
//! ## 配置优先级
//!
//! 1. 命令行参数（最高）
//! 2. 配置文件 (config.json)
//! 3. 默认值（最低）

use serde::{Deserialize, Serialize};
use stage_runtime::DisplayOptions;
use std::fs;
use std::path::{Path, PathBuf};

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 数据库 JSON 路径
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// 调试配置
    #[serde(default)]
    pub debug: DebugConfig,

    /// 图标叠加层显示选项
    #[serde(default)]
    pub display: DisplayOptions,
}

/// 调试配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugConfig {
    /// 载入后打印注册表
    #[serde(default)]
    pub print_registry: bool,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/database.json")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            debug: DebugConfig::default(),
            display: DisplayOptions::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置文件
    ///
    /// 如果文件不存在或解析失败，返回默认配置并输出警告。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(path = %path.display(), "配置文件不存在，使用默认配置");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "配置文件加载成功");
                    config
                }
                Err(e) => {
                    tracing::warn!("配置文件解析失败: {}，使用默认配置", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("配置文件读取失败: {}，使用默认配置", e);
                Self::default()
            }
        }
    }

    /// 保存配置到文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializationFailed(e.to_string()))?;

        fs::write(path, json).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.database_path.is_file() {
            return Err(ConfigError::ValidationFailed(format!(
                "数据库文件不存在: {:?}",
                self.database_path
            )));
        }

        if let Some(text) = &self.display.max_text
            && text.trim().is_empty()
        {
            return Err(ConfigError::ValidationFailed(
                "display.max_text 不能为空字符串（不需要时设为 null）".to_string(),
            ));
        }

        Ok(())
    }
}

/// 配置错误
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// 序列化失败
    SerializationFailed(String),
    /// IO 错误
    IoError(String),
    /// 验证失败
    ValidationFailed(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::SerializationFailed(e) => write!(f, "配置序列化失败: {}", e),
            ConfigError::IoError(e) => write!(f, "配置 IO 错误: {}", e),
            ConfigError::ValidationFailed(e) => write!(f, "配置验证失败: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.database_path, PathBuf::from("data/database.json"));
        assert!(!config.debug.print_registry);
        assert_eq!(config.display.max_text.as_deref(), Some("max"));
    }

    #[test]
    fn test_partial_config() {
        let json = r#"{ "debug": { "print_registry": true }, "display": { "max_text": null } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert!(config.debug.print_registry);
        assert_eq!(config.display.max_text, None);
        assert!(config.display.show_number);
        assert_eq!(config.database_path, default_database_path());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();

        // 反序列化
        let loaded: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let config = AppConfig::load("definitely/not/here/config.json");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig {
            database_path: PathBuf::from("definitely/not/here.json"),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed(_))
        ));

        // Cargo.toml 一定存在
        config.database_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
        assert!(config.validate().is_ok());

        config.display.max_text = Some("  ".to_string());
        assert!(config.validate().is_err());
    }
}
