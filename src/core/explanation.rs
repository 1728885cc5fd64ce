//! 解释构建模块
//!
//! 为每个变量输出 {值, 语言项: 隶属度}（只保留隶属度 > 0 的项），
//! 为每条触发的规则输出名称、前件、后件、权重、支持度等独立字段。

use crate::core::inference::EvaluationContext;
use crate::core::models::{
    Antecedent, Consequent, Explanation, FunctionBlock, OutputDecision, RuleExplanation,
    Variable, VariableExplanation,
};
use std::collections::BTreeMap;
use std::fmt;

impl fmt::Display for Antecedent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Antecedent::Clause { variable, term } => write!(f, "{} IS {}", variable, term),
            Antecedent::Not(inner) => match inner.as_ref() {
                Antecedent::Clause { variable, term } => write!(f, "{} IS NOT {}", variable, term),
                other => write!(f, "NOT ({})", other),
            },
            Antecedent::And(l, r) => {
                write_operand(f, l, "AND")?;
                write!(f, " AND ")?;
                write_operand(f, r, "AND")
            }
            Antecedent::Or(l, r) => {
                write_operand(f, l, "OR")?;
                write!(f, " OR ")?;
                write_operand(f, r, "OR")
            }
        }
    }
}

/// 与父节点运算不同的二元子表达式加括号
fn write_operand(f: &mut fmt::Formatter<'_>, node: &Antecedent, parent: &str) -> fmt::Result {
    let needs_parens = match node {
        Antecedent::And(..) => parent != "AND",
        Antecedent::Or(..) => parent != "OR",
        _ => false,
    };
    if needs_parens {
        write!(f, "({})", node)
    } else {
        write!(f, "{}", node)
    }
}

impl fmt::Display for Consequent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} IS {}", self.variable, self.term)
    }
}

/// 把后件列表渲染为文本
pub fn render_consequents(consequents: &[Consequent]) -> String {
    consequents
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// 解释构建器
pub struct ExplanationBuilder<'a> {
    block: &'a FunctionBlock,
}

impl<'a> ExplanationBuilder<'a> {
    pub fn new(block: &'a FunctionBlock) -> Self {
        Self { block }
    }

    /// 基于同一个评估上下文构建解释
    pub fn build(
        &self,
        ctx: &EvaluationContext<'_>,
        outputs: &BTreeMap<String, OutputDecision>,
    ) -> Explanation {
        let inputs = self
            .block
            .inputs()
            .filter_map(|var| {
                let value = ctx.input(&var.name)?;
                let terms = positive_terms(ctx.fuzzify(var));
                Some((var.name.clone(), VariableExplanation { value, terms }))
            })
            .collect();

        let outputs = self
            .block
            .outputs()
            .filter_map(|var| {
                let decision = outputs.get(&var.name)?;
                Some((
                    var.name.clone(),
                    VariableExplanation {
                        value: decision.crisp_value,
                        terms: memberships_at(var, decision.crisp_value),
                    },
                ))
            })
            .collect();

        let fired_rules = ctx
            .fired_rules()
            .iter()
            .filter_map(|fired| {
                let rule_block = self.block.rule_blocks().get(fired.block)?;
                let rule = rule_block.rules.get(fired.rule)?;
                Some(RuleExplanation {
                    rule_block: rule_block.name.clone(),
                    name: rule.name.clone(),
                    antecedent: rule.antecedent.to_string(),
                    consequent: render_consequents(&rule.consequents),
                    weight: rule.weight,
                    degree_of_support: fired.degree_of_support,
                })
            })
            .collect();

        Explanation {
            inputs,
            outputs,
            fired_rules,
        }
    }
}

/// 变量在 x 处隶属度为正的语言项
pub fn memberships_at(variable: &Variable, x: f64) -> BTreeMap<String, f64> {
    let x = variable.clamp(x);
    positive_terms(
        variable
            .terms
            .iter()
            .map(|t| (t.name.as_str(), t.function.membership(x)))
            .collect(),
    )
}

fn positive_terms(degrees: Vec<(&str, f64)>) -> BTreeMap<String, f64> {
    degrees
        .into_iter()
        .filter(|(_, d)| *d > 0.0)
        .map(|(name, d)| (name.to_string(), d))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_nested_antecedent() {
        let expr = Antecedent::clause("a", "x")
            .and(Antecedent::clause("b", "y").or(Antecedent::clause("c", "z").negate()));
        assert_eq!(expr.to_string(), "a IS x AND (b IS y OR c IS NOT z)");

        let chained = Antecedent::clause("a", "x")
            .and(Antecedent::clause("b", "y"))
            .and(Antecedent::clause("c", "z"));
        assert_eq!(chained.to_string(), "a IS x AND b IS y AND c IS z");

        let negated_group = Antecedent::clause("a", "x")
            .or(Antecedent::clause("b", "y"))
            .negate();
        assert_eq!(negated_group.to_string(), "NOT (a IS x OR b IS y)");
    }

    #[test]
    fn test_render_consequents() {
        let text = render_consequents(&[
            Consequent::new("out", "high"),
            Consequent::new("alarm", "on"),
        ]);
        assert_eq!(text, "out IS high, alarm IS on");
    }

    #[test]
    fn test_memberships_at_drops_zero_terms() {
        use crate::core::models::{LinguisticTerm, MembershipFunction};

        let var = Variable::output(
            "out",
            0.0,
            10.0,
            vec![
                LinguisticTerm::new("low", MembershipFunction::Triangular { a: 0.0, b: 0.0, c: 5.0 }),
                LinguisticTerm::new("mid", MembershipFunction::Triangular { a: 2.0, b: 5.0, c: 8.0 }),
                LinguisticTerm::new("high", MembershipFunction::Triangular { a: 5.0, b: 10.0, c: 10.0 }),
            ],
        );
        let terms = memberships_at(&var, 4.0);
        assert_eq!(terms.len(), 2);
        assert!(terms.contains_key("low"));
        assert!(terms.contains_key("mid"));
        assert!(!terms.contains_key("high"));
    }
}
