//! # IdP Hook Engine
//!
//! 身份平台 Hook 引擎：把平台在注册、身份识别和登录节点上的回调
//! 转发给外部系统（CRM、风控、身份核验、审计与通知），并把结果翻译为平台可理解的 Hook 结果。
//!
//! ## 架构设计
//!
//! - **domain层**：集成配置模型与领域规则（联系人校验、风险阈值、核验属性合并）
//! - **infrastructure层**：各外部集成的适配器与工厂
//! - **interface层**：HTTP 调用入口
//! - **service层**：应用启动和依赖注入

pub mod domain;
pub mod infrastructure;
pub mod interface;
pub mod service;

pub use domain::model::IntegrationConfig;
pub use infrastructure::adapters::IntegrationFactory;
pub use service::ApplicationBootstrap;
