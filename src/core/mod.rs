//! Core模块 - 模糊规则求值与解释的全部业务逻辑

pub mod models;
pub mod error;
pub mod membership;
pub mod inference;
pub mod defuzzifier;
pub mod explanation;
pub mod fcl;
pub mod loader;
pub mod rule_engine;
