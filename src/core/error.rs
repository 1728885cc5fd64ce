//! 错误类型定义
//!
//! 配置错误只在启动阶段出现，属于致命错误；
//! 决策错误由调用方输入引起，必须完整地反馈给调用方。

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// 规则源加载或规则模型校验失败
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// 规则源不存在（文件系统和内置资源中都找不到）
    #[error("找不到模糊控制语言(FCL)规则文件: {0}")]
    RuleSourceNotFound(String),

    /// 规则源存在但无法读取
    #[error("无法读取FCL规则文件 {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// FCL语法错误
    #[error("FCL解析失败（第{line}行）: {message}")]
    Syntax { line: usize, message: String },

    /// 规则模型语义错误
    #[error("规则模型无效: {0}")]
    InvalidModel(String),
}

/// 名称校验失败时收集到的完整名单
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputViolations {
    /// 提供了但规则集中不存在的参数（已排序）
    pub unknown: Vec<String>,
    /// 规则集要求但未提供的参数（已排序）
    pub missing: Vec<String>,
}

impl InputViolations {
    pub fn is_empty(&self) -> bool {
        self.unknown.is_empty() && self.missing.is_empty()
    }
}

impl fmt::Display for InputViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.unknown.is_empty() {
            parts.push(format!("未知的决策输入参数: {:?}", self.unknown));
        }
        if !self.missing.is_empty() {
            parts.push(format!("缺少决策输入参数: {:?}", self.missing));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// 值无法转换为数值的参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueViolation {
    pub parameter: String,
    pub reason: String,
}

impl fmt::Display for ValueViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`: {}", self.parameter, self.reason)
    }
}

/// 单次决策调用中可能出现的错误
#[derive(Debug, Error)]
pub enum DecisionError {
    /// 未知参数和缺失参数，两类可同时出现
    #[error("{0}")]
    InvalidInputs(InputViolations),

    /// 参数值不是数值，按参数名排序列出全部
    #[error("决策输入参数的值无效: {}", join_violations(.0))]
    InvalidValues(Vec<ValueViolation>),

    /// 去模糊化结果上没有任何语言项具有正隶属度
    #[error("输出变量 `{variable}` 在去模糊化值 {} 处没有隶属度为正的语言项", format_crisp(.crisp_value))]
    UnresolvedTerm {
        variable: String,
        crisp_value: Option<f64>,
    },
}

impl DecisionError {
    /// 未知参数名单（其他错误返回空）
    pub fn unknown_inputs(&self) -> &[String] {
        match self {
            DecisionError::InvalidInputs(v) => &v.unknown,
            _ => &[],
        }
    }

    /// 缺失参数名单（其他错误返回空）
    pub fn missing_inputs(&self) -> &[String] {
        match self {
            DecisionError::InvalidInputs(v) => &v.missing,
            _ => &[],
        }
    }

    /// 值无效的参数名单（其他错误返回空）
    pub fn invalid_inputs(&self) -> Vec<&str> {
        match self {
            DecisionError::InvalidValues(v) => v.iter().map(|v| v.parameter.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// 错误种类名称，供HTTP层输出
    pub fn kind(&self) -> &'static str {
        match self {
            DecisionError::InvalidInputs(v) if v.missing.is_empty() => "UnknownInputError",
            DecisionError::InvalidInputs(v) if v.unknown.is_empty() => "MissingInputError",
            DecisionError::InvalidInputs(_) => "UnknownInputError+MissingInputError",
            DecisionError::InvalidValues(_) => "InvalidValueError",
            DecisionError::UnresolvedTerm { .. } => "UnresolvedTermError",
        }
    }
}

fn join_violations(violations: &[ValueViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_crisp(value: &Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "(无)".to_string(),
    }
}
