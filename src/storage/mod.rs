//! Storage模块 - 配置文件与决策审计记录

pub mod config;
pub mod database;
