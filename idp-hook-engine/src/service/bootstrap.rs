//! # Hook引擎应用启动器
//!
//! 负责加载配置、初始化日志、装配依赖并启动 HTTP 服务

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing::info;

use idp_hooks_core::load_config;
use idp_hooks_core::tracing::init_tracing_from_config;

use super::wire;
use crate::interface::http;

/// 应用启动器
pub struct ApplicationBootstrap;

impl ApplicationBootstrap {
    /// 运行应用的主入口点
    pub async fn run(config_path: &str) -> Result<()> {
        let app_config = load_config(Some(config_path))
            .with_context(|| format!("failed to load config from {config_path}"))?;
        init_tracing_from_config(Some(&app_config.logging));

        let address: SocketAddr = app_config
            .server
            .socket_addr()
            .parse()
            .context("invalid hook-engine server address")?;
        info!(address = %address, "Server address parsed successfully");

        let context = wire::initialize(&app_config).await?;
        Self::run_with_context(context, address).await
    }

    /// 运行服务（带应用上下文）
    async fn run_with_context(context: wire::ApplicationContext, address: SocketAddr) -> Result<()> {
        let app = http::router(context.state);
        let listener = tokio::net::TcpListener::bind(address)
            .await
            .with_context(|| format!("failed to bind {address}"))?;

        let hooks = context.registry.len().await;
        info!(address = %address, hooks, "Hook engine HTTP service is listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %err, "failed to listen for shutdown signal");
                }
                info!("shutdown signal received (Ctrl+C)");
            })
            .await
            .context("http server error")?;

        info!("Hook engine stopped");
        Ok(())
    }
}
