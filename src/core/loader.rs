//! 规则加载模块
//!
//! 按名称定位FCL规则源：先查文件系统，再查编译进二进制的内置资源。
//! 找不到或解析失败都是致命的启动错误，不做重试。

use crate::core::error::ConfigurationError;
use crate::core::fcl::parse_fcl_blocks;
use crate::core::models::FunctionBlock;
use sha2::{Digest, Sha256};
use std::path::Path;

/// 内置规则资源（名称, 内容）
const BUNDLED_RULES: &[(&str, &str)] = &[(
    "logistics.fcl",
    include_str!("../../rules/logistics.fcl"),
)];

/// 规则源的来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOrigin {
    /// 文件系统中的外部文件
    External(String),
    /// 内置资源
    BuiltIn(String),
}

/// 加载完成的规则集
#[derive(Debug, Clone)]
pub struct LoadedRules {
    /// 默认（第一个）功能块
    pub function_block: FunctionBlock,
    /// 规则源文本的 SHA-256 摘要（十六进制）
    pub digest: String,
    pub origin: RuleOrigin,
}

/// 按名称加载规则
pub fn load_rules(name: &str) -> Result<LoadedRules, ConfigurationError> {
    tracing::info!("初始化模糊推理系统，FCL文件: {}", name);

    let path = Path::new(name);
    let (source, origin) = if path.is_file() {
        let source = std::fs::read_to_string(path).map_err(|source| {
            ConfigurationError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
        })?;
        (source, RuleOrigin::External(name.to_string()))
    } else {
        let source = bundled_rules(name)
            .ok_or_else(|| ConfigurationError::RuleSourceNotFound(name.to_string()))?;
        (source.to_string(), RuleOrigin::BuiltIn(name.to_string()))
    };

    let rules = load_from_source(&source, origin)?;
    tracing::info!(
        function_block = %rules.function_block.name(),
        digest = %rules.digest,
        origin = ?rules.origin,
        "FCL规则加载成功"
    );
    Ok(rules)
}

/// 从FCL文本加载规则
pub fn load_from_source(source: &str, origin: RuleOrigin) -> Result<LoadedRules, ConfigurationError> {
    let mut blocks = parse_fcl_blocks(source)?;
    if blocks.len() > 1 {
        tracing::debug!(
            "FCL中有 {} 个功能块，使用第一个: {}",
            blocks.len(),
            blocks[0].name()
        );
    }

    Ok(LoadedRules {
        function_block: blocks.remove(0),
        digest: source_digest(source),
        origin,
    })
}

/// 按文件名查找内置资源（忽略目录部分）
pub fn bundled_rules(name: &str) -> Option<&'static str> {
    let file_name = Path::new(name).file_name()?.to_str()?;
    BUNDLED_RULES
        .iter()
        .find(|(bundled, _)| *bundled == file_name)
        .map(|(_, content)| *content)
}

/// 规则源摘要
pub fn source_digest(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}
