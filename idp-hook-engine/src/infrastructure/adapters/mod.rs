//! # 集成适配器工厂
//!
//! 根据 Hook 定义中的 `integration` 表创建对应的外部集成。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;

use idp_hooks_core::{
    ErrorBuilder, ErrorCode, Hook, HookDefinition, HookFactory, HookKind, Result,
};

use crate::domain::model::IntegrationConfig;
use crate::infrastructure::dns::{HickoryReverseResolver, ReverseResolver};

pub mod deduce;
pub mod dynamics;
pub mod eventbridge;
pub mod http;
pub mod hubspot;
pub mod iddataweb;
pub mod salesforce;
pub mod seczetta;
pub mod servicenow;
pub mod slack;
pub mod splunk;

pub use deduce::DeduceHook;
pub use dynamics::DynamicsHook;
pub use eventbridge::{AwsEventPublisher, EventBridgeHook, EventEnvelope, EventPublisher};
pub use hubspot::HubspotHook;
pub use iddataweb::IdDataWebHook;
pub use salesforce::SalesforceHook;
pub use seczetta::SecZettaHook;
pub use servicenow::ServiceNowHook;
pub use slack::SlackHook;
pub use splunk::SplunkHook;

/// 外部调用的默认超时，Hook 级别的超时由执行计划控制
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// 所有集成共用的 HTTP 客户端
pub fn http_client() -> anyhow::Result<Client> {
    Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .user_agent(concat!("idp-hook-engine/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build http client")
}

/// 集成工厂
pub struct IntegrationFactory {
    client: Client,
    resolver: Arc<dyn ReverseResolver>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl IntegrationFactory {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resolver: Arc::new(HickoryReverseResolver::new()),
            publisher: None,
        }
    }

    /// 替换反向 DNS 解析器
    pub fn with_resolver(mut self, resolver: Arc<dyn ReverseResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// 指定事件投递实现，未指定时按配置创建 AWS 客户端
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    async fn create(&self, integration: IntegrationConfig) -> Arc<dyn Hook> {
        let client = self.client.clone();
        match integration {
            IntegrationConfig::Deduce(cfg) => Arc::new(DeduceHook::new(client, cfg)),
            IntegrationConfig::Hubspot(cfg) => Arc::new(HubspotHook::new(client, cfg)),
            IntegrationConfig::Salesforce(cfg) => Arc::new(SalesforceHook::new(client, cfg)),
            IntegrationConfig::Servicenow(cfg) => Arc::new(ServiceNowHook::new(client, cfg)),
            IntegrationConfig::Dynamics(cfg) => Arc::new(DynamicsHook::new(client, cfg)),
            IntegrationConfig::Iddataweb(cfg) => Arc::new(IdDataWebHook::new(client, cfg)),
            IntegrationConfig::Eventbridge(cfg) => {
                let publisher = match &self.publisher {
                    Some(publisher) => publisher.clone(),
                    None => Arc::new(AwsEventPublisher::from_config(&cfg).await),
                };
                Arc::new(EventBridgeHook::new(cfg, publisher))
            }
            IntegrationConfig::Seczetta(cfg) => Arc::new(SecZettaHook::new(client, cfg)),
            IntegrationConfig::Slack(cfg) => {
                Arc::new(SlackHook::new(client, cfg, self.resolver.clone()))
            }
            IntegrationConfig::Splunk(cfg) => Arc::new(SplunkHook::new(client, cfg)),
        }
    }
}

#[async_trait]
impl HookFactory for IntegrationFactory {
    async fn build(&self, kind: HookKind, def: &HookDefinition) -> Result<Arc<dyn Hook>> {
        let integration = IntegrationConfig::from_table(def.resolved_integration()?)?;
        integration.validate()?;

        if integration.supported_kind() != kind {
            return Err(ErrorBuilder::new(
                ErrorCode::ConfigurationError,
                "integration does not support this hook kind",
            )
            .details(format!(
                "hook={}, integration={}, expected={}, configured={}",
                def.name,
                integration.type_name(),
                integration.supported_kind().as_str(),
                kind.as_str()
            ))
            .build_error());
        }

        tracing::debug!(
            hook = %def.name,
            kind = ?kind,
            integration = integration.type_name(),
            "building integration"
        );
        Ok(self.create(integration).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::dns::NoopResolver;
    use idp_hooks_core::HookConfig;

    fn factory() -> IntegrationFactory {
        IntegrationFactory::new(Client::new()).with_resolver(Arc::new(NoopResolver))
    }

    fn definition(toml_str: &str) -> HookDefinition {
        let config = HookConfig::from_toml_str(toml_str).unwrap();
        config
            .pre_registration
            .into_iter()
            .chain(config.post_identification)
            .chain(config.post_account_login)
            .next()
            .unwrap()
    }

    #[tokio::test]
    async fn test_build_matching_kind() {
        let def = definition(
            r#"
            [[pre_registration]]
            name = "crm"
            [pre_registration.integration]
            type = "hubspot"
            access_token = "token"
            "#,
        );
        assert!(factory().build(HookKind::PreRegistration, &def).await.is_ok());
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_configuration_error() {
        let def = definition(
            r#"
            [[post_account_login]]
            name = "crm"
            [post_account_login.integration]
            type = "hubspot"
            access_token = "token"
            "#,
        );
        let err = factory()
            .build(HookKind::PostAccountLogin, &def)
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
    }

    #[tokio::test]
    async fn test_unknown_integration_type() {
        let def = definition(
            r#"
            [[pre_registration]]
            name = "mystery"
            [pre_registration.integration]
            type = "okta"
            "#,
        );
        let err = factory()
            .build(HookKind::PreRegistration, &def)
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
    }
}
