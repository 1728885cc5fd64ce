//! 核心数据模型定义
//!
//! 规则模型（变量、语言项、规则块）在启动时构建一次，之后只读；
//! 决策结果与解释是每次调用独立返回的值，不在任何实例中缓存。

use crate::core::defuzzifier::DEFAULT_RESOLUTION;
use crate::core::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// 变量角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableRole {
    /// 输入变量（VAR_INPUT）
    Input,
    /// 输出变量（VAR_OUTPUT）
    Output,
}

/// 隶属函数形状
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MembershipFunction {
    /// 三角形 (a, b, c)，b 为顶点
    Triangular { a: f64, b: f64, c: f64 },
    /// 梯形 (a, b, c, d)，[b, c] 为平台
    Trapezoidal { a: f64, b: f64, c: f64, d: f64 },
    /// 单点
    Singleton { a: f64 },
    /// 分段线性，点按横坐标升序
    PiecewiseLinear { points: Vec<(f64, f64)> },
    /// 高斯 (均值, 标准差)
    Gaussian { mean: f64, sigma: f64 },
    /// 广义钟形 1 / (1 + |(x - mean) / a|^(2b))
    GeneralizedBell { a: f64, b: f64, mean: f64 },
    /// S型 1 / (1 + exp(-gain * (x - center)))
    Sigmoid { gain: f64, center: f64 },
}

/// 语言项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinguisticTerm {
    /// 名称（在所属变量内唯一）
    pub name: String,
    /// 隶属函数
    pub function: MembershipFunction,
}

impl LinguisticTerm {
    pub fn new(name: impl Into<String>, function: MembershipFunction) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }
}

/// 去模糊化方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DefuzzificationMethod {
    /// 重心法
    #[default]
    CenterOfGravity,
    /// 单点重心法（闭式计算）
    CenterOfGravitySingletons,
    /// 最大值平均
    MeanOfMaximum,
    /// 最左最大值
    LeftmostMaximum,
    /// 最右最大值
    RightmostMaximum,
}

/// 语言变量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// 名称（在功能块内唯一）
    pub name: String,
    /// 角色
    pub role: VariableRole,
    /// 论域下界
    pub min: f64,
    /// 论域上界
    pub max: f64,
    /// 语言项，声明顺序决定平局时的优先级
    pub terms: Vec<LinguisticTerm>,
    /// 去模糊化方法（仅输出变量使用）
    pub defuzzification: DefuzzificationMethod,
    /// 无规则触发时使用的默认值（仅输出变量使用）
    pub default_value: Option<f64>,
}

impl Variable {
    /// 创建输入变量
    pub fn input(name: impl Into<String>, min: f64, max: f64, terms: Vec<LinguisticTerm>) -> Self {
        Self {
            name: name.into(),
            role: VariableRole::Input,
            min,
            max,
            terms,
            defuzzification: DefuzzificationMethod::default(),
            default_value: None,
        }
    }

    /// 创建输出变量
    pub fn output(name: impl Into<String>, min: f64, max: f64, terms: Vec<LinguisticTerm>) -> Self {
        Self {
            role: VariableRole::Output,
            ..Self::input(name, min, max, terms)
        }
    }

    pub fn is_input(&self) -> bool {
        self.role == VariableRole::Input
    }

    pub fn is_output(&self) -> bool {
        self.role == VariableRole::Output
    }

    /// 按名称查找语言项
    pub fn term(&self, name: &str) -> Option<&LinguisticTerm> {
        self.terms.iter().find(|t| t.name == name)
    }

    /// 将数值限制在论域内
    pub fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.min, self.max)
    }
}

/// 规则前件表达式树
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Antecedent {
    /// 变量 IS 语言项
    Clause { variable: String, term: String },
    And(Box<Antecedent>, Box<Antecedent>),
    Or(Box<Antecedent>, Box<Antecedent>),
    Not(Box<Antecedent>),
}

impl Antecedent {
    pub fn clause(variable: impl Into<String>, term: impl Into<String>) -> Self {
        Antecedent::Clause {
            variable: variable.into(),
            term: term.into(),
        }
    }

    pub fn and(self, other: Antecedent) -> Self {
        Antecedent::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Antecedent) -> Self {
        Antecedent::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        Antecedent::Not(Box::new(self))
    }

    /// 遍历所有子句
    pub fn clauses(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        self.collect_clauses(&mut out);
        out
    }

    fn collect_clauses<'a>(&'a self, out: &mut Vec<(&'a str, &'a str)>) {
        match self {
            Antecedent::Clause { variable, term } => out.push((variable.as_str(), term.as_str())),
            Antecedent::And(l, r) | Antecedent::Or(l, r) => {
                l.collect_clauses(out);
                r.collect_clauses(out);
            }
            Antecedent::Not(inner) => inner.collect_clauses(out),
        }
    }
}

/// 规则后件：输出变量 := 语言项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consequent {
    pub variable: String,
    pub term: String,
}

impl Consequent {
    pub fn new(variable: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            term: term.into(),
        }
    }
}

/// 模糊规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub antecedent: Antecedent,
    pub consequents: Vec<Consequent>,
    /// 权重 ∈ [0, 1]
    pub weight: f64,
}

impl Rule {
    /// 创建权重为1的规则
    pub fn new(name: impl Into<String>, antecedent: Antecedent, consequents: Vec<Consequent>) -> Self {
        Self {
            name: name.into(),
            antecedent,
            consequents,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// AND 运算（t-范数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AndMethod {
    #[default]
    Min,
    Product,
    /// 有界差 max(0, a + b - 1)
    BoundedDifference,
}

/// OR 运算（t-余范数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OrMethod {
    #[default]
    Max,
    /// 代数和 a + b - ab
    ProbabilisticSum,
    /// 有界和 min(1, a + b)
    BoundedSum,
}

/// 同一输出语言项上多条规则的累积方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AccumulationMethod {
    #[default]
    Max,
    BoundedSum,
    ProbabilisticOr,
}

/// 激活方式：按激活度截断或缩放输出语言项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ActivationMethod {
    #[default]
    Min,
    Product,
}

/// 规则块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleBlock {
    pub name: String,
    pub rules: Vec<Rule>,
    pub and_method: AndMethod,
    pub or_method: OrMethod,
    pub accumulation: AccumulationMethod,
    pub activation: ActivationMethod,
}

impl RuleBlock {
    /// 使用默认运算（MIN / MAX / MAX / MIN）创建规则块
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            rules,
            and_method: AndMethod::default(),
            or_method: OrMethod::default(),
            accumulation: AccumulationMethod::default(),
            activation: ActivationMethod::default(),
        }
    }
}

/// 功能块：一组变量和规则块构成的决策单元
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionBlock {
    name: String,
    variables: Vec<Variable>,
    rule_blocks: Vec<RuleBlock>,
}

impl FunctionBlock {
    /// 构建并校验功能块
    pub fn new(
        name: impl Into<String>,
        variables: Vec<Variable>,
        rule_blocks: Vec<RuleBlock>,
    ) -> Result<Self, ConfigurationError> {
        let block = Self {
            name: name.into(),
            variables,
            rule_blocks,
        };
        block.validate()?;
        Ok(block)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn rule_blocks(&self) -> &[RuleBlock] {
        &self.rule_blocks
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| v.is_input())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| v.is_output())
    }

    /// 调用方必须提供的输入参数名
    pub fn required_inputs(&self) -> Vec<&str> {
        self.inputs().map(|v| v.name.as_str()).collect()
    }

    /// 输出变量使用的激活方式（由写入它的规则块决定）
    pub fn activation_for(&self, output: &str) -> ActivationMethod {
        self.rule_blocks
            .iter()
            .find(|b| {
                b.rules
                    .iter()
                    .any(|r| r.consequents.iter().any(|c| c.variable == output))
            })
            .map(|b| b.activation)
            .unwrap_or_default()
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |msg: String| Err(ConfigurationError::InvalidModel(msg));

        if self.outputs().next().is_none() {
            return invalid(format!("功能块 `{}` 没有输出变量", self.name));
        }

        let mut names = HashSet::new();
        for var in &self.variables {
            if !names.insert(var.name.as_str()) {
                return invalid(format!("变量名重复: {}", var.name));
            }
            if !(var.min < var.max) {
                return invalid(format!(
                    "变量 `{}` 的论域无效: [{}, {}]",
                    var.name, var.min, var.max
                ));
            }
            if var.terms.is_empty() {
                return invalid(format!("变量 `{}` 没有语言项", var.name));
            }
            let mut term_names = HashSet::new();
            for term in &var.terms {
                if !term_names.insert(term.name.as_str()) {
                    return invalid(format!("变量 `{}` 的语言项重复: {}", var.name, term.name));
                }
            }
            if var.defuzzification == DefuzzificationMethod::CenterOfGravitySingletons
                && var
                    .terms
                    .iter()
                    .any(|t| !matches!(t.function, MembershipFunction::Singleton { .. }))
            {
                return invalid(format!("变量 `{}` 使用COGS时所有语言项必须是单点", var.name));
            }
        }

        let mut block_names = HashSet::new();
        let mut activations: BTreeMap<&str, ActivationMethod> = BTreeMap::new();
        for block in &self.rule_blocks {
            if !block_names.insert(block.name.as_str()) {
                return invalid(format!("规则块名重复: {}", block.name));
            }
            let mut rule_names = HashSet::new();
            for rule in &block.rules {
                if !rule_names.insert(rule.name.as_str()) {
                    return invalid(format!("规则块 `{}` 中规则名重复: {}", block.name, rule.name));
                }
                if !(0.0..=1.0).contains(&rule.weight) {
                    return invalid(format!("规则 `{}` 的权重超出[0, 1]: {}", rule.name, rule.weight));
                }
                for (variable, term) in rule.antecedent.clauses() {
                    self.check_reference(&rule.name, variable, term, VariableRole::Input)?;
                }
                if rule.consequents.is_empty() {
                    return invalid(format!("规则 `{}` 没有后件", rule.name));
                }
                for c in &rule.consequents {
                    self.check_reference(&rule.name, &c.variable, &c.term, VariableRole::Output)?;
                    let previous = activations.entry(c.variable.as_str()).or_insert(block.activation);
                    if *previous != block.activation {
                        return invalid(format!(
                            "输出变量 `{}` 被多个激活方式不同的规则块写入",
                            c.variable
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    fn check_reference(
        &self,
        rule: &str,
        variable: &str,
        term: &str,
        role: VariableRole,
    ) -> Result<(), ConfigurationError> {
        let var = self.variable(variable).ok_or_else(|| {
            ConfigurationError::InvalidModel(format!("规则 `{}` 引用了未知变量 `{}`", rule, variable))
        })?;
        if var.role != role {
            let expected = match role {
                VariableRole::Input => "输入",
                VariableRole::Output => "输出",
            };
            return Err(ConfigurationError::InvalidModel(format!(
                "规则 `{}` 中变量 `{}` 应为{}变量",
                rule, variable, expected
            )));
        }
        if var.term(term).is_none() {
            return Err(ConfigurationError::InvalidModel(format!(
                "规则 `{}` 引用了变量 `{}` 中不存在的语言项 `{}`",
                rule, variable, term
            )));
        }
        Ok(())
    }
}

/// 经过校验的清晰输入值（有限浮点数）
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct CrispValue(f64);

impl CrispValue {
    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for CrispValue {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_finite() {
            Ok(Self(value))
        } else {
            Err(format!("{} 不是有限数值", value))
        }
    }
}

impl TryFrom<&serde_json::Value> for CrispValue {
    type Error = String;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| format!("{} 无法表示为浮点数", n))
                .and_then(CrispValue::try_from),
            other => Err(format!("期望数值，实际为 {}", other)),
        }
    }
}

/// 单个输出变量的决策
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDecision {
    /// 主导语言项
    pub dominant_term: String,
    /// 去模糊化得到的清晰值
    pub crisp_value: f64,
}

/// 变量在解释中的快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableExplanation {
    pub value: f64,
    /// 仅包含隶属度 > 0 的语言项
    pub terms: BTreeMap<String, f64>,
}

/// 已触发规则的结构化记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleExplanation {
    pub rule_block: String,
    pub name: String,
    pub antecedent: String,
    pub consequent: String,
    pub weight: f64,
    pub degree_of_support: f64,
}

/// 决策解释
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Explanation {
    pub inputs: BTreeMap<String, VariableExplanation>,
    pub outputs: BTreeMap<String, VariableExplanation>,
    /// 按规则块与规则声明顺序排列
    pub fired_rules: Vec<RuleExplanation>,
}

/// 一次决策调用的完整结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub outputs: BTreeMap<String, OutputDecision>,
    pub explanation: Explanation,
}

impl Decision {
    /// 指定输出变量的主导语言项
    pub fn dominant_term(&self, output: &str) -> Option<&str> {
        self.outputs.get(output).map(|o| o.dominant_term.as_str())
    }
}

/// 场景配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// FCL规则文件路径（文件系统路径或内置资源名）
    pub fcl_rules_file_path: String,
    /// 决策结果（语言项）到描述文字的映射
    pub decision_results_description: BTreeMap<String, String>,
    /// 去模糊化离散区间数
    pub defuzzification_resolution: usize,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        let descriptions = [
            ("AI_AUTONOMOUSLY", "AI can reschedule without human involvement"),
            ("HUMAN_ON_THE_LOOP", "Human has to be informed about AI's rescheduling"),
            ("HUMAN_IN_THE_LOOP", "Human has to check AI's suggestion"),
            ("HUMAN_MANUALLY", "Human has to decide without AI support"),
        ];
        Self {
            fcl_rules_file_path: "logistics.fcl".to_string(),
            decision_results_description: descriptions
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            defuzzification_resolution: DEFAULT_RESOLUTION,
        }
    }
}

/// HTTP服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// 审计记录配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// 是否记录每次决策
    pub enabled: bool,
    /// 数据库路径，未设置时使用平台数据目录
    pub database_path: Option<PathBuf>,
    /// 最多保留的记录条数，超出后删除最旧的
    pub keep_count: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_path: None,
            keep_count: 10_000,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub scenario: ScenarioConfig,
    pub server: ServerConfig,
    pub audit: AuditConfig,
}
