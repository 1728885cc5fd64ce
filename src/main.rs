//! Sliding Decision - 人机协作程度的模糊决策服务
//!
//! 核心设计原则：
//! - 规则写在FCL里，代码只负责求值
//! - 每个决策都带完整解释
//! - 输入有误时一次性报告全部问题
//! - 规则模型启动时加载一次，之后只读

pub mod core;
pub mod server;
pub mod storage;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::defuzzifier::Defuzzifier;
use crate::core::loader::load_rules;
use crate::core::rule_engine::RuleEngine;
use crate::server::AppState;
use crate::storage::config::ConfigManager;
use crate::storage::database::Database;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("启动 Sliding Decision 服务");

    // 第一个命令行参数为配置文件路径
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(ConfigManager::default_path);
    let config = ConfigManager::new(config_path).load()?;

    // 规则加载失败是致命错误
    let rules = load_rules(&config.scenario.fcl_rules_file_path)
        .context("模糊推理系统初始化失败")?;
    let engine = Arc::new(
        RuleEngine::new(rules.function_block).with_defuzzifier(Defuzzifier::with_resolution(
            config.scenario.defuzzification_resolution,
        )),
    );

    let mut state = AppState::new(
        engine,
        rules.digest,
        config.scenario.decision_results_description.clone(),
    );

    if config.audit.enabled {
        let db_path = config
            .audit
            .database_path
            .clone()
            .unwrap_or_else(ConfigManager::default_database_path);
        let database = Database::open(&db_path)?;
        tracing::info!(
            "决策审计已启用: {}（保留最近 {} 条）",
            db_path.display(),
            config.audit.keep_count
        );
        state = state.with_audit(database, config.audit.keep_count);
    }

    server::run_server(Arc::new(state), &config.server.host, config.server.port).await
}
