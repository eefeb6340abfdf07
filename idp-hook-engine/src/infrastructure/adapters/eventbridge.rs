//! # EventBridge 注册事件投递
//!
//! 投递在后台执行，Hook 立即放行；投递失败只记录日志。

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_eventbridge::Client as EventBridgeClient;
use aws_sdk_eventbridge::config::{Builder as EventBridgeConfigBuilder, Credentials, Region};
use aws_sdk_eventbridge::types::PutEventsRequestEntry;
use serde_json::{Value as JsonValue, json};

use idp_hooks_core::{ErrorBuilder, ErrorCode, Hook, HookResult, InvocationContext, Result};

use crate::domain::model::EventBridgeConfig;

/// 待投递的事件
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub event_bus_name: String,
    pub source: String,
    pub detail_type: String,
    pub detail: JsonValue,
}

/// 事件投递接口
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: EventEnvelope) -> Result<()>;
}

/// 基于 AWS SDK 的投递实现
pub struct AwsEventPublisher {
    client: EventBridgeClient,
}

impl AwsEventPublisher {
    pub async fn from_config(cfg: &EventBridgeConfig) -> Self {
        let region = Region::new(cfg.region.clone());
        let region_provider = RegionProviderChain::first_try(region.clone());
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);

        // 配置了静态凭据时优先使用，否则走默认凭据链
        if let (Some(access_key), Some(secret_key)) =
            (cfg.access_key_id.clone(), cfg.secret_access_key.clone())
        {
            let credentials =
                Credentials::new(access_key, secret_key, None, None, "static-credentials");
            loader = loader.credentials_provider(credentials);
        }
        let aws_cfg = loader.load().await;

        let mut builder = EventBridgeConfigBuilder::from(&aws_cfg).region(region);
        if let Some(endpoint) = cfg.endpoint_url.clone() {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: EventBridgeClient::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl EventPublisher for AwsEventPublisher {
    async fn publish(&self, event: EventEnvelope) -> Result<()> {
        let entry = PutEventsRequestEntry::builder()
            .event_bus_name(event.event_bus_name)
            .source(event.source)
            .detail_type(event.detail_type)
            .detail(event.detail.to_string())
            .build();

        let output = self
            .client
            .put_events()
            .entries(entry)
            .send()
            .await
            .map_err(|err| {
                ErrorBuilder::new(ErrorCode::ServiceUnavailable, "eventbridge put_events failed")
                    .details(format!("{err:?}"))
                    .build_error()
            })?;

        if output.failed_entry_count() > 0 {
            return Err(ErrorBuilder::new(
                ErrorCode::ServiceUnavailable,
                "eventbridge rejected the event",
            )
            .details(format!("{:?}", output.entries()))
            .build_error());
        }
        Ok(())
    }
}

pub struct EventBridgeHook {
    config: EventBridgeConfig,
    publisher: Arc<dyn EventPublisher>,
}

impl EventBridgeHook {
    pub fn new(config: EventBridgeConfig, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { config, publisher }
    }

    /// 注册事件内容
    pub fn registration_detail(ctx: &InvocationContext) -> JsonValue {
        let location = ctx.customer.location.clone().unwrap_or_default();
        let coordinates = location.coordinates.unwrap_or_default();
        json!({
            "E-mail": ctx.customer.primary_email(),
            "Application": ctx.application.name,
            "Location": {
                "City": location.city,
                "State": location.state,
                "Country": location.country,
                "Country Code": location.country_code,
                "Latitude": coordinates.latitude,
                "Longitude": coordinates.longitude,
            }
        })
    }

    fn envelope(&self, ctx: &InvocationContext) -> EventEnvelope {
        EventEnvelope {
            event_bus_name: self.config.event_bus_name.clone(),
            source: self.config.source.clone(),
            detail_type: self.config.detail_type.clone(),
            detail: Self::registration_detail(ctx),
        }
    }
}

#[async_trait]
impl Hook for EventBridgeHook {
    async fn invoke(&self, ctx: &InvocationContext) -> Result<HookResult> {
        let event = self.envelope(ctx);
        let publisher = self.publisher.clone();
        tokio::spawn(async move {
            if let Err(err) = publisher.publish(event).await {
                tracing::warn!(
                    error = %err,
                    details = err.details().unwrap_or_default(),
                    "failed to publish registration event"
                );
            }
        });
        Ok(HookResult::proceed(ctx))
    }
}
