//! PlateHub 配置管理系统
//!
//! 支持YAML配置文件驱动的 Hub 启动

use crate::{HubError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// 默认 I2C 总线编号
pub const DEFAULT_I2C_BUS_ID: u32 = 1;

/// Hub 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Hub 基础设置
    pub hub: HubSettings,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// Hub 基础设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSettings {
    /// Hub 名称
    pub name: String,
    /// 所有缓存设备共用的 I2C 总线
    #[serde(default = "default_i2c_bus_id")]
    pub i2c_bus_id: u32,
}

fn default_i2c_bus_id() -> u32 {
    DEFAULT_I2C_BUS_ID
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,
    /// 是否启用详细日志
    pub verbose: bool,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            hub: HubSettings {
                name: "PlateHub".to_string(),
                i2c_bus_id: DEFAULT_I2C_BUS_ID,
            },
            logging: LoggingConfig {
                level: LogLevel::Info,
                verbose: false,
            },
        }
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    config: HubConfig,
}

impl ConfigManager {
    /// 从文件加载配置
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| HubError::config(&format!("Failed to read config file: {}", e)))?;

        let config: HubConfig = serde_yaml::from_str(&content)
            .map_err(|e| HubError::config(&format!("Failed to parse config file: {}", e)))?;

        Ok(Self { config })
    }

    /// 创建默认配置
    pub fn new_default() -> Self {
        Self {
            config: HubConfig::default(),
        }
    }

    /// 保存配置到文件
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self.config)?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| HubError::config(&format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// 获取配置
    pub fn get_config(&self) -> &HubConfig {
        &self.config
    }

    /// 获取可变配置
    pub fn get_config_mut(&mut self) -> &mut HubConfig {
        &mut self.config
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.config.hub.name.is_empty() {
            return Err(HubError::config("Hub name cannot be empty"));
        }

        // Linux 只暴露 /dev/i2c-0 .. /dev/i2c-255
        if self.config.hub.i2c_bus_id > 255 {
            return Err(HubError::config("I2C bus id must be between 0 and 255"));
        }

        tracing::info!("Configuration validation passed");
        Ok(())
    }
}

/// 生成默认配置文件
pub async fn generate_default_config_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let config_manager = ConfigManager::new_default();
    config_manager.save_to_file(path).await?;
    Ok(())
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先于配置文件中的级别。重复调用不会出错。
pub fn init_logging(config: &LoggingConfig) {
    let level = if config.verbose {
        LogLevel::Trace
    } else {
        config.level
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_manager_default() {
        let config_manager = ConfigManager::new_default();
        let config = config_manager.get_config();

        assert_eq!(config.hub.name, "PlateHub");
        assert_eq!(config.hub.i2c_bus_id, DEFAULT_I2C_BUS_ID);
        assert!(config_manager.validate().is_ok());
    }

    #[tokio::test]
    async fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hub.yaml");

        let mut config_manager = ConfigManager::new_default();
        config_manager.get_config_mut().hub.i2c_bus_id = 3;
        config_manager.save_to_file(&path).await.unwrap();

        let loaded = ConfigManager::load_from_file(&path).await.unwrap();
        assert_eq!(loaded.get_config().hub.name, "PlateHub");
        assert_eq!(loaded.get_config().hub.i2c_bus_id, 3);
    }

    #[tokio::test]
    async fn test_generate_default_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("default.yaml");

        generate_default_config_file(&path).await.unwrap();
        let loaded = ConfigManager::load_from_file(&path).await.unwrap();
        assert!(loaded.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_config_error() {
        let result = ConfigManager::load_from_file("/nonexistent/hub.yaml").await;
        assert!(matches!(result, Err(HubError::Config { .. })));
    }

    #[test]
    fn test_bus_id_defaults_when_omitted() {
        let yaml = "hub:\n  name: bench\nlogging:\n  level: Debug\n  verbose: false\n";
        let config: HubConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.hub.i2c_bus_id, DEFAULT_I2C_BUS_ID);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let mut config_manager = ConfigManager::new_default();
        config_manager.get_config_mut().hub.name.clear();
        assert!(matches!(config_manager.validate(), Err(HubError::Config { .. })));
    }

    #[test]
    fn test_init_logging_twice() {
        let logging = LoggingConfig {
            level: LogLevel::Warn,
            verbose: false,
        };
        init_logging(&logging);
        init_logging(&logging);
    }
}
