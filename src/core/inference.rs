//! 推理引擎模块
//!
//! 负责模糊化输入、自底向上计算规则前件、按规则块的累积方式
//! 汇总每个输出语言项的激活度。
//!
//! 所有中间状态都保存在 `EvaluationContext` 中，每次调用新建一个，
//! 规则模型本身只读。

use crate::core::models::{
    AccumulationMethod, AndMethod, Antecedent, CrispValue, FunctionBlock, OrMethod, Rule,
    RuleBlock, Variable,
};
use std::collections::BTreeMap;

impl AndMethod {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            AndMethod::Min => a.min(b),
            AndMethod::Product => a * b,
            AndMethod::BoundedDifference => (a + b - 1.0).max(0.0),
        }
    }
}

impl OrMethod {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            OrMethod::Max => a.max(b),
            OrMethod::ProbabilisticSum => a + b - a * b,
            OrMethod::BoundedSum => (a + b).min(1.0),
        }
    }
}

impl AccumulationMethod {
    /// 将新的支持度并入当前激活度
    pub fn accumulate(self, current: f64, support: f64) -> f64 {
        match self {
            AccumulationMethod::Max => current.max(support),
            AccumulationMethod::BoundedSum => (current + support).min(1.0),
            AccumulationMethod::ProbabilisticOr => current + support - current * support,
        }
    }
}

/// 已触发规则（支持度 > 0）
#[derive(Debug, Clone, PartialEq)]
pub struct FiredRule {
    /// 规则块下标
    pub block: usize,
    /// 规则在块内的下标
    pub rule: usize,
    pub degree_of_support: f64,
}

/// 单次评估的工作状态
///
/// 生命周期恰好是一次决策调用，不能跨调用复用。
#[derive(Debug)]
pub struct EvaluationContext<'a> {
    block: &'a FunctionBlock,
    /// 调用方提供的原始输入值
    inputs: BTreeMap<String, f64>,
    /// 输出变量 -> 按声明顺序的语言项激活度
    activations: BTreeMap<String, Vec<f64>>,
    fired: Vec<FiredRule>,
}

impl<'a> EvaluationContext<'a> {
    /// 为功能块创建空白上下文
    pub fn new(block: &'a FunctionBlock) -> Self {
        let activations = block
            .outputs()
            .map(|v| (v.name.clone(), vec![0.0; v.terms.len()]))
            .collect();
        Self {
            block,
            inputs: BTreeMap::new(),
            activations,
            fired: Vec::new(),
        }
    }

    /// 绑定输入值
    pub fn bind(&mut self, name: impl Into<String>, value: CrispValue) {
        self.inputs.insert(name.into(), value.value());
    }

    /// 输入变量的原始值
    pub fn input(&self, name: &str) -> Option<f64> {
        self.inputs.get(name).copied()
    }

    /// 输出变量各语言项的激活度（声明顺序）
    pub fn activations(&self, output: &str) -> Option<&[f64]> {
        self.activations.get(output).map(|v| v.as_slice())
    }

    pub fn fired_rules(&self) -> &[FiredRule] {
        &self.fired
    }

    /// 模糊化：计算输入值相对变量每个语言项的隶属度（含零值）
    pub fn fuzzify(&self, variable: &Variable) -> Vec<(&'a str, f64)> {
        let x = self.input(&variable.name).map(|v| variable.clamp(v));
        self.block
            .variable(&variable.name)
            .map(|v| {
                v.terms
                    .iter()
                    .map(|t| (t.name.as_str(), x.map(|x| t.function.membership(x)).unwrap_or(0.0)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 子句隶属度：未绑定的变量视为 0
    fn clause_degree(&self, variable: &str, term: &str) -> f64 {
        let Some(var) = self.block.variable(variable) else {
            return 0.0;
        };
        let (Some(x), Some(term)) = (self.input(variable), var.term(term)) else {
            return 0.0;
        };
        term.function.membership(var.clamp(x))
    }
}

/// 推理引擎
pub struct InferenceEngine<'a> {
    block: &'a FunctionBlock,
}

impl<'a> InferenceEngine<'a> {
    pub fn new(block: &'a FunctionBlock) -> Self {
        Self { block }
    }

    /// 计算全部规则并累积输出激活度
    pub fn run(&self, ctx: &mut EvaluationContext<'_>) {
        for (block_index, rule_block) in self.block.rule_blocks().iter().enumerate() {
            for (rule_index, rule) in rule_block.rules.iter().enumerate() {
                let support = degree_of_support(ctx, rule_block, rule);
                if support <= 0.0 {
                    continue;
                }

                tracing::debug!(
                    rule_block = %rule_block.name,
                    rule = %rule.name,
                    support,
                    "规则触发"
                );

                for consequent in &rule.consequents {
                    let Some(var) = self.block.variable(&consequent.variable) else {
                        continue;
                    };
                    let Some(index) = var.terms.iter().position(|t| t.name == consequent.term)
                    else {
                        continue;
                    };
                    if let Some(slots) = ctx.activations.get_mut(&consequent.variable) {
                        slots[index] = rule_block.accumulation.accumulate(slots[index], support);
                    }
                }

                ctx.fired.push(FiredRule {
                    block: block_index,
                    rule: rule_index,
                    degree_of_support: support,
                });
            }
        }
    }
}

/// 规则支持度 = 前件强度 × 权重
pub fn degree_of_support(ctx: &EvaluationContext<'_>, rule_block: &RuleBlock, rule: &Rule) -> f64 {
    let strength = evaluate_antecedent(ctx, rule_block, &rule.antecedent);
    (strength * rule.weight).clamp(0.0, 1.0)
}

/// 自底向上计算前件
pub fn evaluate_antecedent(
    ctx: &EvaluationContext<'_>,
    rule_block: &RuleBlock,
    antecedent: &Antecedent,
) -> f64 {
    match antecedent {
        Antecedent::Clause { variable, term } => ctx.clause_degree(variable, term),
        Antecedent::And(l, r) => rule_block.and_method.apply(
            evaluate_antecedent(ctx, rule_block, l),
            evaluate_antecedent(ctx, rule_block, r),
        ),
        Antecedent::Or(l, r) => rule_block.or_method.apply(
            evaluate_antecedent(ctx, rule_block, l),
            evaluate_antecedent(ctx, rule_block, r),
        ),
        Antecedent::Not(inner) => 1.0 - evaluate_antecedent(ctx, rule_block, inner),
    }
}
