//! # Dynamics 365 联系人校验

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use idp_hooks_core::{ErrorBuilder, ErrorCode, Hook, HookResult, InvocationContext, Result};

use super::http::{read_json, transport_error};
use crate::domain::model::DynamicsConfig;
use crate::domain::service::{require_primary_email, verify_contact};

const SERVICE: &str = "dynamics";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ContactsResponse {
    value: Vec<JsonValue>,
}

pub struct DynamicsHook {
    client: Client,
    config: DynamicsConfig,
}

impl DynamicsHook {
    pub fn new(client: Client, config: DynamicsConfig) -> Self {
        Self { client, config }
    }

    /// 客户端凭据模式获取令牌
    async fn access_token(&self) -> Result<String> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("resource", self.config.resource.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.authority_url)
            .form(&form)
            .send()
            .await
            .map_err(|err| transport_error(SERVICE, err))?;
        let token = read_json::<TokenResponse>(SERVICE, response)
            .await
            .map_err(|err| {
                ErrorBuilder::new(
                    ErrorCode::AuthenticationFailed,
                    "Failed to authenticate to dynamics.",
                )
                .details(err.to_string())
                .build_error()
            })?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl Hook for DynamicsHook {
    async fn invoke(&self, ctx: &InvocationContext) -> Result<HookResult> {
        let email = require_primary_email(ctx)?;
        let token = self.access_token().await?;

        let url = format!(
            "{}/api/data/{}/contacts",
            self.config.resource.trim_end_matches('/'),
            self.config.api_version
        );
        let filter = format!("emailaddress1 eq '{}'", email.replace('\'', "''"));
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("$select", "fullname"), ("$filter", filter.as_str())])
            .send()
            .await
            .map_err(|err| transport_error(SERVICE, err))?;
        let contacts: ContactsResponse = read_json(SERVICE, response).await?;

        let records = contacts.value.len();
        tracing::debug!(records, "dynamics contacts retrieved");
        verify_contact(records > 0, records, ctx)
    }
}
