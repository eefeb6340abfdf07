//! Wire 风格的依赖注入模块
//!
//! 按依赖顺序构建注册表、调度器与 HTTP 状态

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use idp_hooks_core::{AppConfig, HookConfigLoader, HookDispatcher, HookFactory, HookRegistry};

use crate::infrastructure::adapters::{IntegrationFactory, http_client};
use crate::interface::http::AppState;

/// 应用上下文
pub struct ApplicationContext {
    pub registry: Arc<HookRegistry>,
    pub state: AppState,
}

/// 使用默认集成工厂构建应用上下文
pub async fn initialize(config: &AppConfig) -> Result<ApplicationContext> {
    let factory = IntegrationFactory::new(http_client()?);
    initialize_with_factory(config, &factory).await
}

pub async fn initialize_with_factory(
    config: &AppConfig,
    factory: &dyn HookFactory,
) -> Result<ApplicationContext> {
    // 1. 加载 Hook 配置
    let loader = match &config.hooks.path {
        Some(path) => HookConfigLoader::with_path(path.clone()),
        None => HookConfigLoader::new(),
    };
    let hook_config = loader.load().context("failed to load hook configuration")?;

    // 2. 构建并注册 Hook
    let registry = HookRegistry::new();
    let installed = hook_config.install(registry.clone(), factory).await;
    let names = registry.names().await;
    info!(installed, hooks = ?names, "hooks installed");

    // 3. 调度器与 HTTP 状态
    let dispatcher = HookDispatcher::new(registry.clone());
    let state = AppState::new(dispatcher).with_signing_secret(config.signing.secret.clone());
    if state.signing_secret.is_none() {
        tracing::warn!("signing secret not configured, hook requests are not authenticated");
    }

    Ok(ApplicationContext { registry, state })
}
