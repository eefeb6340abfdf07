//! # IdP Hook Engine 入口

use anyhow::Result;
use idp_hook_engine::ApplicationBootstrap;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var("IDP_HOOKS_CONFIG").unwrap_or_else(|_| "config".to_string());
    ApplicationBootstrap::run(&config_path).await
}
