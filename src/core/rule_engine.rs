//! 规则引擎模块
//!
//! 负责决策调用的编排：先校验参数名和参数值，全部通过后才进行推理、
//! 去模糊化和解释构建。
//! 规则模型在构造后只读，可以通过 `Arc` 在多个请求间共享。

use crate::core::defuzzifier::Defuzzifier;
use crate::core::error::{ConfigurationError, DecisionError, InputViolations, ValueViolation};
use crate::core::explanation::ExplanationBuilder;
use crate::core::fcl::parse_fcl;
use crate::core::inference::{EvaluationContext, InferenceEngine};
use crate::core::models::{CrispValue, Decision, FunctionBlock};
use std::collections::{BTreeMap, BTreeSet};

/// 规则引擎
#[derive(Debug, Clone)]
pub struct RuleEngine {
    /// 校验过的规则模型
    block: FunctionBlock,
    defuzzifier: Defuzzifier,
}

impl RuleEngine {
    /// 用已构建的功能块创建引擎
    pub fn new(block: FunctionBlock) -> Self {
        Self {
            block,
            defuzzifier: Defuzzifier::new(),
        }
    }

    /// 直接从FCL文本创建引擎
    pub fn from_fcl(source: &str) -> Result<Self, ConfigurationError> {
        parse_fcl(source).map(Self::new)
    }

    /// 替换去模糊化器（调整离散化精度）
    pub fn with_defuzzifier(mut self, defuzzifier: Defuzzifier) -> Self {
        self.defuzzifier = defuzzifier;
        self
    }

    pub fn function_block(&self) -> &FunctionBlock {
        &self.block
    }

    /// 校验参数名：未知参数与缺失参数一并收集
    pub fn validate_names<'n>(
        &self,
        provided: impl IntoIterator<Item = &'n str>,
    ) -> Result<(), DecisionError> {
        let required: BTreeSet<&str> = self.block.required_inputs().into_iter().collect();
        let provided: BTreeSet<&str> = provided.into_iter().collect();

        let violations = InputViolations {
            unknown: provided
                .difference(&required)
                .map(|s| s.to_string())
                .collect(),
            missing: required
                .difference(&provided)
                .map(|s| s.to_string())
                .collect(),
        };

        if violations.is_empty() {
            Ok(())
        } else {
            tracing::warn!("决策输入参数校验失败: {}", violations);
            Err(DecisionError::InvalidInputs(violations))
        }
    }

    /// 对JSON参数做一次完整决策
    pub fn decide(
        &self,
        parameters: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Decision, DecisionError> {
        self.validate_names(parameters.keys().map(String::as_str))?;

        // 全部参数都转换一遍，错误一次性报告
        let mut bindings = Vec::with_capacity(parameters.len());
        let mut violations = Vec::new();
        for (name, raw) in parameters {
            match CrispValue::try_from(raw) {
                Ok(value) => bindings.push((name.as_str(), value)),
                Err(reason) => violations.push(ValueViolation {
                    parameter: name.clone(),
                    reason,
                }),
            }
        }

        if !violations.is_empty() {
            let err = DecisionError::InvalidValues(violations);
            tracing::warn!("{}", err);
            return Err(err);
        }

        self.evaluate(bindings)
    }

    /// 推理 -> 去模糊化 -> 解释
    fn evaluate(&self, bindings: Vec<(&str, CrispValue)>) -> Result<Decision, DecisionError> {
        let mut ctx = EvaluationContext::new(&self.block);
        for (name, value) in bindings {
            ctx.bind(name, value);
        }

        InferenceEngine::new(&self.block).run(&mut ctx);

        let mut outputs = BTreeMap::new();
        for variable in self.block.outputs() {
            let activations = ctx.activations(&variable.name).unwrap_or_default();
            let decision = self.defuzzifier.defuzzify(
                variable,
                activations,
                self.block.activation_for(&variable.name),
            )?;
            tracing::debug!(
                output = %variable.name,
                term = %decision.dominant_term,
                value = decision.crisp_value,
                "去模糊化完成"
            );
            outputs.insert(variable.name.clone(), decision);
        }

        let explanation = ExplanationBuilder::new(&self.block).build(&ctx, &outputs);

        tracing::info!(
            function_block = %self.block.name(),
            fired = explanation.fired_rules.len(),
            "决策完成"
        );

        Ok(Decision {
            outputs,
            explanation,
        })
    }
}
