//! # Hook引擎领域层
//!
//! 定义集成配置模型与领域判定规则

pub mod model;
pub mod service;

pub use model::*;
