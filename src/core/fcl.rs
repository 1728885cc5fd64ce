//! FCL（模糊控制语言，IEC 61131-7）解析模块
//!
//! 支持的子集：
//! - `FUNCTION_BLOCK` / `VAR_INPUT` / `VAR_OUTPUT`
//! - `FUZZIFY` / `DEFUZZIFY`：`TERM`、`RANGE`、`METHOD`、`DEFAULT`
//! - `RULEBLOCK`：`AND`、`OR`、`ACT`、`ACCU`、`RULE ... IF ... THEN ... WITH ...`
//!
//! 关键字大小写不敏感，标识符区分大小写。
//! 注释支持 `//`、`(* *)` 和 `/* */`。

use crate::core::error::ConfigurationError;
use crate::core::models::{
    AccumulationMethod, ActivationMethod, AndMethod, Antecedent, Consequent,
    DefuzzificationMethod, FunctionBlock, LinguisticTerm, MembershipFunction, OrMethod, Rule,
    RuleBlock, Variable, VariableRole,
};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, digit1, multispace1, one_of, satisfy},
    combinator::{map, map_res, opt, recognize, value},
    multi::many0,
    sequence::{pair, tuple},
    IResult,
};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Assign,
    Colon,
    Semicolon,
    Comma,
    LParen,
    RParen,
    Range,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
}

fn syntax(line: usize, message: impl Into<String>) -> ConfigurationError {
    ConfigurationError::Syntax {
        line,
        message: message.into(),
    }
}

/// 空白和注释
fn ws(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), pair(tag("//"), take_while(|c| c != '\n'))),
            value((), tuple((tag("(*"), take_until("*)"), tag("*)")))),
            value((), tuple((tag("/*"), take_until("*/"), tag("*/")))),
        ))),
    )(input)
}

/// 数字：可带符号、小数和指数，`0..10` 中的 `..` 不算小数点
fn number(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(tuple((
            opt(one_of("+-")),
            alt((
                recognize(pair(digit1, opt(pair(char('.'), digit1)))),
                recognize(pair(char('.'), digit1)),
            )),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        str::parse::<f64>,
    )(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::Assign, tag(":=")),
        value(Token::Colon, char(':')),
        value(Token::Semicolon, char(';')),
        value(Token::Comma, char(',')),
        value(Token::Range, tag("..")),
        map(number, Token::Number),
        value(Token::LParen, char('(')),
        value(Token::RParen, char(')')),
        map(identifier, |s: &str| Token::Ident(s.to_string())),
    ))(input)
}

fn tokenize(source: &str) -> Result<Vec<Spanned>, ConfigurationError> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut rest = source;

    loop {
        let (after_ws, _) = ws(rest).map_err(|_| syntax(line, "无法跳过空白"))?;
        line += consumed(rest, after_ws).matches('\n').count();
        rest = after_ws;

        if rest.is_empty() {
            break;
        }
        if rest.starts_with("(*") || rest.starts_with("/*") {
            return Err(syntax(line, "注释未闭合"));
        }

        match token(rest) {
            Ok((after, token)) => {
                tokens.push(Spanned { token, line });
                rest = after;
            }
            Err(_) => {
                let c = rest.chars().next().unwrap_or(' ');
                return Err(syntax(line, format!("无法识别的字符: {:?}", c)));
            }
        }
    }

    Ok(tokens)
}

/// rest 到 after 之间被消耗的文本
fn consumed<'a>(rest: &'a str, after: &str) -> &'a str {
    &rest[..rest.len() - after.len()]
}

/// 变量声明（VAR_INPUT / VAR_OUTPUT 中出现的顺序）
struct Declared {
    name: String,
    role: VariableRole,
    terms: Vec<LinguisticTerm>,
    range: Option<(f64, f64)>,
    method: DefuzzificationMethod,
    default_value: Option<f64>,
    defined: bool,
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn next(&mut self) -> Result<Token, ConfigurationError> {
        let token = self
            .tokens
            .get(self.pos)
            .map(|t| t.token.clone())
            .ok_or_else(|| syntax(self.line(), "意外的文件结尾"))?;
        self.pos += 1;
        Ok(token)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ConfigurationError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(syntax(
                self.line(),
                format!("期望 {}，实际为 {}", keyword, self.describe_next()),
            ))
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ConfigurationError> {
        let line = self.line();
        let token = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(syntax(line, format!("期望 {:?}，实际为 {:?}", expected, token)))
        }
    }

    fn ident(&mut self) -> Result<String, ConfigurationError> {
        let line = self.line();
        match self.next()? {
            Token::Ident(s) => Ok(s),
            other => Err(syntax(line, format!("期望标识符，实际为 {:?}", other))),
        }
    }

    fn number(&mut self) -> Result<f64, ConfigurationError> {
        let line = self.line();
        match self.next()? {
            Token::Number(n) => Ok(n),
            other => Err(syntax(line, format!("期望数字，实际为 {:?}", other))),
        }
    }

    fn describe_next(&self) -> String {
        match self.peek() {
            Some(t) => format!("{:?}", t),
            None => "文件结尾".to_string(),
        }
    }

    fn function_block(&mut self) -> Result<FunctionBlock, ConfigurationError> {
        self.expect_keyword("FUNCTION_BLOCK")?;
        let name = match self.peek() {
            Some(Token::Ident(s)) if !is_section_keyword(s) => Some(s.clone()),
            _ => None,
        };
        let name = match name {
            Some(name) => {
                self.pos += 1;
                name
            }
            None => "default".to_string(),
        };

        let mut declared: Vec<Declared> = Vec::new();
        let mut rule_blocks = Vec::new();

        loop {
            if self.eat_keyword("END_FUNCTION_BLOCK") {
                break;
            }
            if self.eat_keyword("VAR_INPUT") {
                self.var_section(VariableRole::Input, &mut declared)?;
            } else if self.eat_keyword("VAR_OUTPUT") {
                self.var_section(VariableRole::Output, &mut declared)?;
            } else if self.eat_keyword("FUZZIFY") {
                self.fuzzify(&mut declared, VariableRole::Input)?;
            } else if self.eat_keyword("DEFUZZIFY") {
                self.fuzzify(&mut declared, VariableRole::Output)?;
            } else if self.eat_keyword("RULEBLOCK") {
                rule_blocks.push(self.rule_block()?);
            } else {
                return Err(syntax(
                    self.line(),
                    format!("功能块中出现意外内容: {}", self.describe_next()),
                ));
            }
        }

        let mut variables = Vec::with_capacity(declared.len());
        for d in declared {
            if !d.defined {
                let section = match d.role {
                    VariableRole::Input => "FUZZIFY",
                    VariableRole::Output => "DEFUZZIFY",
                };
                return Err(ConfigurationError::InvalidModel(format!(
                    "变量 `{}` 缺少 {} 定义",
                    d.name, section
                )));
            }
            let (min, max) = d.range.unwrap_or_else(|| derived_range(&d.terms));
            variables.push(Variable {
                name: d.name,
                role: d.role,
                min,
                max,
                terms: d.terms,
                defuzzification: d.method,
                default_value: d.default_value,
            });
        }

        FunctionBlock::new(name, variables, rule_blocks)
    }

    fn var_section(
        &mut self,
        role: VariableRole,
        declared: &mut Vec<Declared>,
    ) -> Result<(), ConfigurationError> {
        while !self.eat_keyword("END_VAR") {
            let name = self.ident()?;
            self.expect(Token::Colon)?;
            let line = self.line();
            let ty = self.ident()?;
            if !ty.eq_ignore_ascii_case("REAL") {
                return Err(syntax(line, format!("变量 `{}` 的类型必须为 REAL，实际为 {}", name, ty)));
            }
            self.expect(Token::Semicolon)?;
            if declared.iter().any(|d| d.name == name) {
                return Err(syntax(line, format!("变量重复声明: {}", name)));
            }
            declared.push(Declared {
                name,
                role,
                terms: Vec::new(),
                range: None,
                method: DefuzzificationMethod::default(),
                default_value: None,
                defined: false,
            });
        }
        Ok(())
    }

    fn fuzzify(
        &mut self,
        declared: &mut [Declared],
        role: VariableRole,
    ) -> Result<(), ConfigurationError> {
        let line = self.line();
        let name = self.ident()?;
        let (section, end) = match role {
            VariableRole::Input => ("FUZZIFY", "END_FUZZIFY"),
            VariableRole::Output => ("DEFUZZIFY", "END_DEFUZZIFY"),
        };

        let Some(target) = declared.iter_mut().find(|d| d.name == name) else {
            return Err(syntax(line, format!("{} 引用了未声明的变量 `{}`", section, name)));
        };
        if target.role != role {
            return Err(syntax(line, format!("变量 `{}` 不能出现在 {} 中", name, section)));
        }
        target.defined = true;

        while !self.eat_keyword(end) {
            let line = self.line();
            if self.eat_keyword("TERM") {
                let term_name = self.ident()?;
                self.expect(Token::Assign)?;
                let function = self.membership_function()?;
                self.expect(Token::Semicolon)?;
                target.terms.push(LinguisticTerm::new(term_name, function));
            } else if self.eat_keyword("RANGE") {
                self.expect(Token::Assign)?;
                self.expect(Token::LParen)?;
                let min = self.number()?;
                self.expect(Token::Range)?;
                let max = self.number()?;
                self.expect(Token::RParen)?;
                self.expect(Token::Semicolon)?;
                target.range = Some((min, max));
            } else if role == VariableRole::Output && self.eat_keyword("METHOD") {
                self.expect(Token::Colon)?;
                let method = self.ident()?;
                target.method = match method.to_ascii_uppercase().as_str() {
                    "COG" => DefuzzificationMethod::CenterOfGravity,
                    "COGS" => DefuzzificationMethod::CenterOfGravitySingletons,
                    "MM" | "MOM" => DefuzzificationMethod::MeanOfMaximum,
                    "LM" => DefuzzificationMethod::LeftmostMaximum,
                    "RM" => DefuzzificationMethod::RightmostMaximum,
                    _ => return Err(syntax(line, format!("不支持的去模糊化方法: {}", method))),
                };
                self.expect(Token::Semicolon)?;
            } else if role == VariableRole::Output && self.eat_keyword("DEFAULT") {
                self.expect(Token::Assign)?;
                target.default_value = if self.eat_keyword("NC") {
                    None
                } else {
                    Some(self.number()?)
                };
                self.expect(Token::Semicolon)?;
            } else {
                return Err(syntax(
                    line,
                    format!("{} 中出现意外内容: {}", section, self.describe_next()),
                ));
            }
        }
        Ok(())
    }

    fn membership_function(&mut self) -> Result<MembershipFunction, ConfigurationError> {
        let line = self.line();
        match self.peek() {
            Some(Token::LParen) => {
                let mut points: Vec<(f64, f64)> = Vec::new();
                while self.peek() == Some(&Token::LParen) {
                    self.expect(Token::LParen)?;
                    let x = self.number()?;
                    self.expect(Token::Comma)?;
                    let y = self.number()?;
                    self.expect(Token::RParen)?;
                    if !(0.0..=1.0).contains(&y) {
                        return Err(syntax(line, format!("隶属度必须在[0, 1]内: {}", y)));
                    }
                    if points.last().map_or(false, |p| x < p.0) {
                        return Err(syntax(line, "分段线性点的横坐标必须非递减"));
                    }
                    points.push((x, y));
                }
                Ok(MembershipFunction::PiecewiseLinear { points })
            }
            Some(Token::Number(_)) => Ok(MembershipFunction::Singleton { a: self.number()? }),
            Some(Token::Ident(_)) => {
                let shape = self.ident()?;
                let function = match shape.to_ascii_lowercase().as_str() {
                    "trian" => {
                        let (a, b, c) = (self.number()?, self.number()?, self.number()?);
                        if !(a <= b && b <= c) {
                            return Err(syntax(line, "三角形参数必须满足 a <= b <= c"));
                        }
                        MembershipFunction::Triangular { a, b, c }
                    }
                    "trape" => {
                        let (a, b, c, d) =
                            (self.number()?, self.number()?, self.number()?, self.number()?);
                        if !(a <= b && b <= c && c <= d) {
                            return Err(syntax(line, "梯形参数必须满足 a <= b <= c <= d"));
                        }
                        MembershipFunction::Trapezoidal { a, b, c, d }
                    }
                    "singleton" => MembershipFunction::Singleton { a: self.number()? },
                    "gauss" => MembershipFunction::Gaussian {
                        mean: self.number()?,
                        sigma: self.number()?,
                    },
                    "gbell" => MembershipFunction::GeneralizedBell {
                        a: self.number()?,
                        b: self.number()?,
                        mean: self.number()?,
                    },
                    "sigm" => MembershipFunction::Sigmoid {
                        gain: self.number()?,
                        center: self.number()?,
                    },
                    _ => return Err(syntax(line, format!("不支持的隶属函数: {}", shape))),
                };
                Ok(function)
            }
            _ => Err(syntax(
                line,
                format!("期望隶属函数定义，实际为 {}", self.describe_next()),
            )),
        }
    }

    fn rule_block(&mut self) -> Result<RuleBlock, ConfigurationError> {
        let name = match self.peek() {
            Some(Token::Ident(s)) if !is_rule_block_keyword(s) => Some(s.clone()),
            Some(Token::Number(n)) => Some(format_number(*n)),
            _ => None,
        };
        let name = match name {
            Some(name) => {
                self.pos += 1;
                name
            }
            None => "default".to_string(),
        };

        let mut and_method: Option<AndMethod> = None;
        let mut or_method: Option<OrMethod> = None;
        let mut block = RuleBlock::new(name, Vec::new());

        while !self.eat_keyword("END_RULEBLOCK") {
            let line = self.line();
            if self.eat_keyword("AND") {
                self.expect(Token::Colon)?;
                let method = self.ident()?;
                and_method = Some(match method.to_ascii_uppercase().as_str() {
                    "MIN" => AndMethod::Min,
                    "PROD" => AndMethod::Product,
                    "BDIF" => AndMethod::BoundedDifference,
                    _ => return Err(syntax(line, format!("不支持的AND运算: {}", method))),
                });
                self.expect(Token::Semicolon)?;
            } else if self.eat_keyword("OR") {
                self.expect(Token::Colon)?;
                let method = self.ident()?;
                or_method = Some(match method.to_ascii_uppercase().as_str() {
                    "MAX" => OrMethod::Max,
                    "ASUM" => OrMethod::ProbabilisticSum,
                    "BSUM" => OrMethod::BoundedSum,
                    _ => return Err(syntax(line, format!("不支持的OR运算: {}", method))),
                });
                self.expect(Token::Semicolon)?;
            } else if self.eat_keyword("ACT") {
                self.expect(Token::Colon)?;
                let method = self.ident()?;
                block.activation = match method.to_ascii_uppercase().as_str() {
                    "MIN" => ActivationMethod::Min,
                    "PROD" => ActivationMethod::Product,
                    _ => return Err(syntax(line, format!("不支持的激活方式: {}", method))),
                };
                self.expect(Token::Semicolon)?;
            } else if self.eat_keyword("ACCU") {
                self.expect(Token::Colon)?;
                let method = self.ident()?;
                block.accumulation = match method.to_ascii_uppercase().as_str() {
                    "MAX" => AccumulationMethod::Max,
                    "BSUM" => AccumulationMethod::BoundedSum,
                    "PROBOR" => AccumulationMethod::ProbabilisticOr,
                    _ => return Err(syntax(line, format!("不支持的累积方式: {}", method))),
                };
                self.expect(Token::Semicolon)?;
            } else if self.eat_keyword("RULE") {
                block.rules.push(self.rule()?);
            } else {
                return Err(syntax(
                    line,
                    format!("RULEBLOCK 中出现意外内容: {}", self.describe_next()),
                ));
            }
        }

        // 只声明一侧时按对偶关系补全另一侧
        block.and_method = and_method.unwrap_or(match or_method {
            Some(OrMethod::ProbabilisticSum) => AndMethod::Product,
            Some(OrMethod::BoundedSum) => AndMethod::BoundedDifference,
            _ => AndMethod::Min,
        });
        block.or_method = or_method.unwrap_or(match block.and_method {
            AndMethod::Product => OrMethod::ProbabilisticSum,
            AndMethod::BoundedDifference => OrMethod::BoundedSum,
            AndMethod::Min => OrMethod::Max,
        });

        Ok(block)
    }

    fn rule(&mut self) -> Result<Rule, ConfigurationError> {
        let line = self.line();
        let name = match self.next()? {
            Token::Ident(s) => s,
            Token::Number(n) => format_number(n),
            other => return Err(syntax(line, format!("期望规则名，实际为 {:?}", other))),
        };
        self.expect(Token::Colon)?;
        self.expect_keyword("IF")?;
        let antecedent = self.or_expr()?;
        self.expect_keyword("THEN")?;

        let mut consequents = vec![self.consequent()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            consequents.push(self.consequent()?);
        }

        let weight = if self.eat_keyword("WITH") {
            self.number()?
        } else {
            1.0
        };
        self.expect(Token::Semicolon)?;

        Ok(Rule::new(name, antecedent, consequents).with_weight(weight))
    }

    fn or_expr(&mut self) -> Result<Antecedent, ConfigurationError> {
        let mut expr = self.and_expr()?;
        while self.eat_keyword("OR") {
            expr = expr.or(self.and_expr()?);
        }
        Ok(expr)
    }

    fn and_expr(&mut self) -> Result<Antecedent, ConfigurationError> {
        let mut expr = self.unary()?;
        while self.eat_keyword("AND") {
            expr = expr.and(self.unary()?);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Antecedent, ConfigurationError> {
        if self.eat_keyword("NOT") {
            return Ok(self.unary()?.negate());
        }
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let expr = self.or_expr()?;
            self.expect(Token::RParen)?;
            return Ok(expr);
        }
        let variable = self.ident()?;
        self.expect_keyword("IS")?;
        let negated = self.eat_keyword("NOT");
        let term = self.ident()?;
        let clause = Antecedent::clause(variable, term);
        Ok(if negated { clause.negate() } else { clause })
    }

    fn consequent(&mut self) -> Result<Consequent, ConfigurationError> {
        let variable = self.ident()?;
        self.expect_keyword("IS")?;
        let term = self.ident()?;
        Ok(Consequent::new(variable, term))
    }
}

fn is_section_keyword(word: &str) -> bool {
    ["VAR_INPUT", "VAR_OUTPUT", "FUZZIFY", "DEFUZZIFY", "RULEBLOCK", "END_FUNCTION_BLOCK"]
        .iter()
        .any(|k| word.eq_ignore_ascii_case(k))
}

fn is_rule_block_keyword(word: &str) -> bool {
    ["AND", "OR", "ACT", "ACCU", "RULE", "END_RULEBLOCK"]
        .iter()
        .any(|k| word.eq_ignore_ascii_case(k))
}

/// 规则名或规则块名为数字时（如 `RULE 1`）转成文本
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// 未声明 RANGE 时由语言项形状推导论域
fn derived_range(terms: &[LinguisticTerm]) -> (f64, f64) {
    terms
        .iter()
        .map(|t| t.function.extent())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, b)| {
            (lo.min(a), hi.max(b))
        })
}

/// 解析FCL文本，返回所有功能块（按出现顺序）
pub fn parse_fcl_blocks(source: &str) -> Result<Vec<FunctionBlock>, ConfigurationError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
    };

    let mut blocks = Vec::new();
    while parser.peek().is_some() {
        blocks.push(parser.function_block()?);
    }
    if blocks.is_empty() {
        return Err(syntax(1, "没有找到 FUNCTION_BLOCK"));
    }
    Ok(blocks)
}

/// 解析FCL文本，返回默认（第一个）功能块
pub fn parse_fcl(source: &str) -> Result<FunctionBlock, ConfigurationError> {
    let mut blocks = parse_fcl_blocks(source)?;
    Ok(blocks.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
        // 简单示例
        FUNCTION_BLOCK tipper
        VAR_INPUT
            service : REAL;
            food : REAL;
        END_VAR
        VAR_OUTPUT
            tip : REAL;
        END_VAR

        FUZZIFY service
            TERM poor := gauss 0 1.5;
            TERM good := gauss 5 1.5;
            TERM excellent := gauss 10 1.5;
            RANGE := (0 .. 10);
        END_FUZZIFY

        FUZZIFY food
            TERM rancid := trian 0 0 4;
            TERM delicious := (6, 0) (9, 1) (10, 1);
        END_FUZZIFY

        DEFUZZIFY tip
            TERM cheap := (0,0) (5,1) (10,0);
            TERM average := (10,0) (15,1) (20,0);
            TERM generous := (20,0) (25,1) (30,0);
            METHOD : COG;
            DEFAULT := 0;
        END_DEFUZZIFY

        RULEBLOCK No1
            AND : PROD;
            ACCU : MAX;
            (* 规则 *)
            RULE 1 : IF service IS poor OR food IS rancid THEN tip IS cheap;
            RULE 2 : IF service IS good THEN tip IS average WITH 0.5;
            RULE 3 : IF service IS excellent AND NOT (food IS rancid) THEN tip IS generous;
        END_RULEBLOCK
        END_FUNCTION_BLOCK
    "#;

    #[test]
    fn test_parse_small_block() {
        let block = parse_fcl(SMALL).unwrap();
        assert_eq!(block.name(), "tipper");
        assert_eq!(block.required_inputs(), vec!["service", "food"]);

        let food = block.variable("food").unwrap();
        // 未声明 RANGE：由形状推导
        assert_eq!((food.min, food.max), (0.0, 10.0));
        assert_eq!(food.terms[1].name, "delicious");

        let tip = block.variable("tip").unwrap();
        assert_eq!(tip.default_value, Some(0.0));
        assert_eq!((tip.min, tip.max), (0.0, 30.0));

        let rb = &block.rule_blocks()[0];
        assert_eq!(rb.name, "No1");
        assert_eq!(rb.and_method, AndMethod::Product);
        // 只声明 AND : PROD 时 OR 取对偶的 ASUM
        assert_eq!(rb.or_method, OrMethod::ProbabilisticSum);
        assert_eq!(rb.rules.len(), 3);
        assert_eq!(rb.rules[0].name, "1");
        assert_eq!(rb.rules[1].weight, 0.5);
        assert_eq!(
            rb.rules[2].antecedent,
            Antecedent::clause("service", "excellent")
                .and(Antecedent::clause("food", "rancid").negate())
        );
    }

    #[test]
    fn test_is_not_clause_and_multiple_consequents() {
        let src = r#"
            FUNCTION_BLOCK
            VAR_INPUT x : REAL; END_VAR
            VAR_OUTPUT y : REAL; z : REAL; END_VAR
            FUZZIFY x TERM a := trian 0 5 10; RANGE := (0 .. 10); END_FUZZIFY
            DEFUZZIFY y TERM on := trian 0 1 1; RANGE := (0 .. 1); END_DEFUZZIFY
            DEFUZZIFY z TERM on := trian 0 1 1; RANGE := (0 .. 1); END_DEFUZZIFY
            RULEBLOCK
            RULE r : IF x IS NOT a THEN y IS on, z IS on;
            END_RULEBLOCK
            END_FUNCTION_BLOCK
        "#;
        let block = parse_fcl(src).unwrap();
        assert_eq!(block.name(), "default");
        let rule = &block.rule_blocks()[0].rules[0];
        assert_eq!(rule.antecedent, Antecedent::clause("x", "a").negate());
        assert_eq!(rule.consequents.len(), 2);
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let src = "FUNCTION_BLOCK f\nVAR_INPUT\n x : REAL\nEND_VAR\nEND_FUNCTION_BLOCK";
        match parse_fcl(src) {
            Err(ConfigurationError::Syntax { line, .. }) => assert_eq!(line, 4),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_semantic_error_for_unknown_term() {
        let src = r#"
            FUNCTION_BLOCK f
            VAR_INPUT x : REAL; END_VAR
            VAR_OUTPUT y : REAL; END_VAR
            FUZZIFY x TERM a := trian 0 5 10; END_FUZZIFY
            DEFUZZIFY y TERM on := trian 0 1 1; END_DEFUZZIFY
            RULEBLOCK rb
            RULE 1 : IF x IS b THEN y IS on;
            END_RULEBLOCK
            END_FUNCTION_BLOCK
        "#;
        assert!(matches!(parse_fcl(src), Err(ConfigurationError::InvalidModel(_))));
    }

    #[test]
    fn test_missing_fuzzify_is_rejected() {
        let src = r#"
            FUNCTION_BLOCK f
            VAR_INPUT x : REAL; END_VAR
            VAR_OUTPUT y : REAL; END_VAR
            DEFUZZIFY y TERM on := trian 0 1 1; END_DEFUZZIFY
            END_FUNCTION_BLOCK
        "#;
        let err = parse_fcl(src).unwrap_err();
        assert!(err.to_string().contains("FUZZIFY"));
    }

    #[test]
    fn test_unclosed_comment() {
        assert!(matches!(
            parse_fcl("FUNCTION_BLOCK (* oops"),
            Err(ConfigurationError::Syntax { .. })
        ));
    }

    #[test]
    fn test_tokenize_numbers_ranges_and_comments() {
        let tokens = tokenize("RANGE := (-1.5e1..10); // 行尾\n(* 跨\n行 *) /* c */ .25 TERM_2").unwrap();
        let kinds: Vec<Token> = tokens.iter().map(|t| t.token.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Ident("RANGE".to_string()),
                Token::Assign,
                Token::LParen,
                Token::Number(-15.0),
                Token::Range,
                Token::Number(10.0),
                Token::RParen,
                Token::Semicolon,
                Token::Number(0.25),
                Token::Ident("TERM_2".to_string()),
            ]
        );
        // 注释中的换行也计入行号
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[8].line, 3);
    }

    #[test]
    fn test_unexpected_character_reports_line() {
        match tokenize("FUNCTION_BLOCK f\n  x # y") {
            Err(ConfigurationError::Syntax { line, message }) => {
                assert_eq!(line, 2);
                assert!(message.contains('#'));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
