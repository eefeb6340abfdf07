//! 身份平台 Hook 契约
//!
//! - 调用上下文与五种执行结果的统一定义
//! - Hook 执行计划：超时、失败策略与错误到结果的映射
//! - 注册中心、调度器与基于 TOML 的 Hook 配置

mod config;
mod context;
mod outcome;
mod registry;
mod runtime;
mod types;

pub use config::{HookConfig, HookConfigLoader, HookDefinition, HookFactory, expand_env};
pub use context::{
    Application, Attributes, ContinueContext, ContinueRequestParameters, Continuation,
    Coordinates, Customer, CustomerInfo, Identifiers, InvocationContext, Location, OidcContext,
    Session, merge_attributes,
};
pub use outcome::{AdditionalAuthenticator, AuthenticationDecision, AuthenticatorType, HookResult};
pub use registry::{HookPlan, HookRegistry, HookRegistryBuilder};
pub use runtime::{Dispatch, HookDispatcher};
pub use types::{FailurePolicy, Hook, HookKind, HookMetadata};
