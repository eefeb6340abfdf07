//! IdP Hooks 核心库
//!
//! 提供身份平台 Hook 契约、错误分类、注册与调度，以及统一的配置加载和日志初始化。

pub mod config;
pub mod error;
pub mod hooks;
pub mod tracing;

pub use config::{AppConfig, ConfigManager, LoggingConfig, load_config};
pub use error::*;
pub use hooks::*;
