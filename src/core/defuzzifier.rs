//! 去模糊化模块
//!
//! 把输出变量的激活度集合转换为清晰值，并选出主导语言项。
//!
//! 主导语言项的平局规则：隶属度相同时取声明顺序中的第一个。
//! 清晰值处没有任何语言项隶属度为正时返回错误，绝不默认选择。

use crate::core::error::DecisionError;
use crate::core::models::{ActivationMethod, DefuzzificationMethod, OutputDecision, Variable};

/// 重心法离散化的区间数
pub const DEFAULT_RESOLUTION: usize = 1000;

/// 去模糊化器
#[derive(Debug, Clone, Copy)]
pub struct Defuzzifier {
    resolution: usize,
}

impl Default for Defuzzifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Defuzzifier {
    pub fn new() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
        }
    }

    /// 指定离散化区间数（至少为1）
    pub fn with_resolution(resolution: usize) -> Self {
        Self {
            resolution: resolution.max(1),
        }
    }

    /// 计算输出变量的清晰值和主导语言项
    pub fn defuzzify(
        &self,
        variable: &Variable,
        activations: &[f64],
        activation: ActivationMethod,
    ) -> Result<OutputDecision, DecisionError> {
        let crisp_value = self
            .crisp_value(variable, activations, activation)
            .or(variable.default_value)
            .ok_or_else(|| DecisionError::UnresolvedTerm {
                variable: variable.name.clone(),
                crisp_value: None,
            })?;

        let dominant_term = dominant_term(variable, crisp_value)?.to_string();

        Ok(OutputDecision {
            dominant_term,
            crisp_value,
        })
    }

    /// 按变量的去模糊化方法计算清晰值；没有任何激活时返回 None
    pub fn crisp_value(
        &self,
        variable: &Variable,
        activations: &[f64],
        activation: ActivationMethod,
    ) -> Option<f64> {
        if !activations.iter().any(|a| *a > 0.0) {
            return None;
        }

        match variable.defuzzification {
            DefuzzificationMethod::CenterOfGravity => {
                self.center_of_gravity(variable, activations, activation)
            }
            DefuzzificationMethod::CenterOfGravitySingletons => {
                center_of_gravity_singletons(variable, activations)
            }
            DefuzzificationMethod::MeanOfMaximum
            | DefuzzificationMethod::LeftmostMaximum
            | DefuzzificationMethod::RightmostMaximum => {
                self.maximum(variable, activations, activation)
            }
        }
    }

    /// 网格上第 i 个采样点
    fn sample(&self, variable: &Variable, i: usize) -> f64 {
        if i == self.resolution {
            return variable.max;
        }
        variable.min + (variable.max - variable.min) * i as f64 / self.resolution as f64
    }

    fn center_of_gravity(
        &self,
        variable: &Variable,
        activations: &[f64],
        activation: ActivationMethod,
    ) -> Option<f64> {
        let mut area = 0.0;
        let mut moment = 0.0;
        for i in 0..=self.resolution {
            let x = self.sample(variable, i);
            let mu = continuous_membership(variable, activations, activation, x);
            area += mu;
            moment += mu * x;
        }

        // 单点项按点质量计入，此时连续部分需换算成面积
        let (mass, mass_moment) = singleton_mass(variable, activations);
        if mass > 0.0 {
            let step = (variable.max - variable.min) / self.resolution as f64;
            area = area * step + mass;
            moment = moment * step + mass_moment;
        }

        if area > 0.0 {
            Some(variable.clamp(moment / area))
        } else {
            None
        }
    }

    fn maximum(
        &self,
        variable: &Variable,
        activations: &[f64],
        activation: ActivationMethod,
    ) -> Option<f64> {
        let mut candidates: Vec<(f64, f64)> = (0..=self.resolution)
            .map(|i| {
                let x = self.sample(variable, i);
                (x, continuous_membership(variable, activations, activation, x))
            })
            .collect();
        candidates.extend(active_singletons(variable, activations));

        let best = candidates.iter().map(|(_, mu)| *mu).fold(0.0, f64::max);
        if best <= 0.0 {
            return None;
        }
        let mut positions: Vec<f64> = candidates
            .into_iter()
            .filter(|(_, mu)| *mu == best)
            .map(|(x, _)| x)
            .collect();
        positions.sort_by(f64::total_cmp);

        let (first, last) = (positions.first()?, positions.last()?);
        Some(match variable.defuzzification {
            DefuzzificationMethod::LeftmostMaximum => *first,
            DefuzzificationMethod::RightmostMaximum => *last,
            _ => positions.iter().sum::<f64>() / positions.len() as f64,
        })
    }
}

/// 单点重心：Σ(激活度 × 位置) / Σ激活度
fn center_of_gravity_singletons(variable: &Variable, activations: &[f64]) -> Option<f64> {
    let mut weight = 0.0;
    let mut moment = 0.0;
    for (term, act) in variable.terms.iter().zip(activations) {
        if *act <= 0.0 {
            continue;
        }
        let position = term.function.singleton_position()?;
        weight += act;
        moment += act * position;
    }

    if weight > 0.0 {
        Some(moment / weight)
    } else {
        None
    }
}

/// 被激活的单点项（位置, 激活度）
fn active_singletons<'a>(
    variable: &'a Variable,
    activations: &'a [f64],
) -> impl Iterator<Item = (f64, f64)> + 'a {
    variable
        .terms
        .iter()
        .zip(activations)
        .filter(|(_, act)| **act > 0.0)
        .filter_map(|(term, act)| term.function.singleton_position().map(|a| (a, *act)))
}

/// 单点项的总质量和一阶矩；截断和缩放对高度为1的单点结果相同
fn singleton_mass(variable: &Variable, activations: &[f64]) -> (f64, f64) {
    active_singletons(variable, activations)
        .fold((0.0, 0.0), |(mass, moment), (a, act)| (mass + act, moment + act * a))
}

/// 非单点语言项按激活度截断（或缩放）后取最大值构成的组合模糊集
fn continuous_membership(
    variable: &Variable,
    activations: &[f64],
    activation: ActivationMethod,
    x: f64,
) -> f64 {
    variable
        .terms
        .iter()
        .zip(activations)
        .filter(|(term, act)| **act > 0.0 && term.function.singleton_position().is_none())
        .map(|(term, act)| {
            let mu = term.function.membership(x);
            match activation {
                ActivationMethod::Min => mu.min(*act),
                ActivationMethod::Product => mu * act,
            }
        })
        .fold(0.0, f64::max)
}

/// 在清晰值处隶属度最大的语言项；平局取声明顺序第一个。
/// 全部由单点构成的输出变量取离清晰值最近的单点。
pub fn dominant_term(variable: &Variable, crisp_value: f64) -> Result<&str, DecisionError> {
    let x = variable.clamp(crisp_value);
    let mut best: Option<&str> = None;
    let mut best_degree = 0.0;
    for term in &variable.terms {
        let degree = term.function.membership(x);
        if degree > best_degree {
            best_degree = degree;
            best = Some(term.name.as_str());
        }
    }

    best.or_else(|| nearest_singleton(variable, x))
        .ok_or_else(|| DecisionError::UnresolvedTerm {
            variable: variable.name.clone(),
            crisp_value: Some(crisp_value),
        })
}

fn nearest_singleton(variable: &Variable, x: f64) -> Option<&str> {
    let mut nearest: Option<(&str, f64)> = None;
    for term in &variable.terms {
        let distance = (term.function.singleton_position()? - x).abs();
        if nearest.map_or(true, |(_, d)| distance < d) {
            nearest = Some((term.name.as_str(), distance));
        }
    }
    nearest.map(|(name, _)| name)
}
