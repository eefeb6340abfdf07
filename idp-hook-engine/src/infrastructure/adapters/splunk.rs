//! # Splunk 登录审计
//!
//! 通过 HTTP Event Collector 写入登录事件。

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{Value as JsonValue, json};

use idp_hooks_core::{Hook, HookResult, InvocationContext, Result};

use super::http::{ensure_success, transport_error};
use crate::domain::model::SplunkConfig;

const SERVICE: &str = "splunk";

pub struct SplunkHook {
    client: Client,
    config: SplunkConfig,
}

impl SplunkHook {
    pub fn new(client: Client, config: SplunkConfig) -> Self {
        Self { client, config }
    }

    pub fn login_event(ctx: &InvocationContext) -> JsonValue {
        let location = ctx.customer.location.clone().unwrap_or_default();
        let coordinates = location.coordinates.unwrap_or_default();
        json!({
            "message": {
                "action": "login",
                "user": ctx.customer.user_name(),
                "src_ip": ctx.customer.ip_address,
                "application": ctx.application.name,
                "location": {
                    "city": location.city,
                    "state": location.state,
                    "country": location.country,
                    "country_code": location.country_code,
                    "latitude": coordinates.latitude,
                    "longitude": coordinates.longitude,
                }
            }
        })
    }

    fn payload(&self, ctx: &InvocationContext) -> JsonValue {
        let mut payload = json!({
            "time": Utc::now().timestamp_millis() as f64 / 1000.0,
            "event": Self::login_event(ctx),
        });
        if let Some(source) = &self.config.source {
            payload["source"] = json!(source);
        }
        if let Some(sourcetype) = &self.config.sourcetype {
            payload["sourcetype"] = json!(sourcetype);
        }
        payload
    }
}

#[async_trait]
impl Hook for SplunkHook {
    async fn invoke(&self, ctx: &InvocationContext) -> Result<HookResult> {
        let url = format!(
            "{}/services/collector/event",
            self.config.url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Splunk {}", self.config.token))
            .json(&self.payload(ctx))
            .send()
            .await
            .map_err(|err| transport_error(SERVICE, err))?;
        ensure_success(SERVICE, response).await?;
        Ok(HookResult::proceed(ctx))
    }
}
