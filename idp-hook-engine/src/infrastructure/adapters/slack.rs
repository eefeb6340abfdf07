//! # Slack 登录通知

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value as JsonValue, json};

use idp_hooks_core::{Hook, HookResult, InvocationContext, Result};

use super::http::{ensure_success, transport_error};
use crate::domain::model::SlackConfig;
use crate::infrastructure::dns::ReverseResolver;

const SERVICE: &str = "slack";

pub struct SlackHook {
    client: Client,
    config: SlackConfig,
    resolver: Arc<dyn ReverseResolver>,
}

impl SlackHook {
    pub fn new(client: Client, config: SlackConfig, resolver: Arc<dyn ReverseResolver>) -> Self {
        Self {
            client,
            config,
            resolver,
        }
    }

    /// 客户端 IP，可解析时附带域名，如 `203.0.113.7 (host.example.com)`
    async fn describe_ip(&self, ip: &str) -> String {
        if !self.config.reverse_dns {
            return ip.to_string();
        }
        let Ok(addr) = ip.parse::<IpAddr>() else {
            return ip.to_string();
        };
        match self.resolver.reverse(addr).await {
            Some(domain) => format!("{ip} ({domain})"),
            None => ip.to_string(),
        }
    }

    fn message(&self, ctx: &InvocationContext, ip: String) -> JsonValue {
        let mut message = json!({
            "text": "User completed login",
            "attachments": [{
                "fields": [
                    { "title": "Application Name", "value": ctx.application.name, "short": true },
                    { "title": "User ID", "value": ctx.customer.user_name(), "short": true },
                    { "title": "IP", "value": ip, "short": true },
                ]
            }]
        });
        if let Some(channel) = &self.config.channel {
            message["channel"] = json!(channel);
        }
        message
    }
}

#[async_trait]
impl Hook for SlackHook {
    async fn invoke(&self, ctx: &InvocationContext) -> Result<HookResult> {
        let ip = match ctx.customer.ip_address.as_deref() {
            Some(ip) => self.describe_ip(ip).await,
            None => String::new(),
        };

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&self.message(ctx, ip))
            .send()
            .await
            .map_err(|err| transport_error(SERVICE, err))?;
        ensure_success(SERVICE, response).await?;
        Ok(HookResult::proceed(ctx))
    }
}
