//! 配置文件管理模块

use crate::core::models::AppConfig;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// 配置管理器
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// 创建配置管理器
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// 获取默认配置路径
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "sliding-decision", "SlidingDecision")
            .map(|d| d.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    }

    /// 获取默认审计数据库路径
    pub fn default_database_path() -> PathBuf {
        directories::ProjectDirs::from("com", "sliding-decision", "SlidingDecision")
            .map(|d| d.data_dir().join("decisions.db"))
            .unwrap_or_else(|| PathBuf::from("decisions.db"))
    }

    /// 加载配置；文件不存在时写出一份默认配置供修改
    pub fn load(&self) -> Result<AppConfig> {
        if self.config_path.exists() {
            let content = std::fs::read_to_string(&self.config_path)
                .with_context(|| format!("读取配置文件失败: {}", self.config_path.display()))?;
            let config = serde_json::from_str(&content)
                .with_context(|| format!("配置文件格式错误: {}", self.config_path.display()))?;
            tracing::info!("已加载配置: {}", self.config_path.display());
            return Ok(config);
        }

        let config = AppConfig::default();
        match self.save(&config) {
            Ok(()) => tracing::info!("配置文件不存在，已写出默认配置: {}", self.config_path.display()),
            Err(e) => tracing::warn!("配置文件不存在，且无法写出默认配置: {:#}", e),
        }
        Ok(config)
    }

    /// 保存配置
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        // 确保目录存在
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)
            .with_context(|| format!("写入配置文件失败: {}", self.config_path.display()))?;
        Ok(())
    }
}
