//! # Salesforce 联系人校验
//!
//! 先以密码模式换取访问令牌，再用 SOQL 按邮箱查询联系人，恰好一条记录才放行。

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use idp_hooks_core::{ErrorBuilder, ErrorCode, Hook, HookResult, InvocationContext, Result};

use super::http::{read_json, transport_error};
use crate::domain::model::SalesforceConfig;
use crate::domain::service::{require_primary_email, verify_contact};

const SERVICE: &str = "salesforce";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    total_size: u64,
    #[serde(default)]
    records: Vec<JsonValue>,
}

pub struct SalesforceHook {
    client: Client,
    config: SalesforceConfig,
}

impl SalesforceHook {
    pub fn new(client: Client, config: SalesforceConfig) -> Self {
        Self { client, config }
    }

    async fn authenticate(&self) -> Result<TokenResponse> {
        let url = format!(
            "{}/services/oauth2/token",
            self.config.login_url.trim_end_matches('/')
        );
        let form = [
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let result = async {
            let response = self
                .client
                .post(&url)
                .form(&form)
                .send()
                .await
                .map_err(|err| transport_error(SERVICE, err))?;
            read_json::<TokenResponse>(SERVICE, response).await
        }
        .await;

        result.map_err(|err| {
            ErrorBuilder::new(
                ErrorCode::AuthenticationFailed,
                "Failed to authenticate to salesforce.",
            )
            .details(err.to_string())
            .build_error()
        })
    }
}

/// SOQL 字符串字面量转义
fn soql_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl Hook for SalesforceHook {
    async fn invoke(&self, ctx: &InvocationContext) -> Result<HookResult> {
        let email = require_primary_email(ctx)?;
        let token = self.authenticate().await?;

        let url = format!(
            "{}/services/data/{}/query",
            token.instance_url.trim_end_matches('/'),
            self.config.api_version
        );
        let soql = format!(
            "SELECT Id FROM Contact WHERE Email = '{}'",
            soql_literal(email)
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token.access_token)
            .query(&[("q", soql.as_str())])
            .send()
            .await
            .map_err(|err| transport_error(SERVICE, err))?;
        let query: QueryResponse = read_json(SERVICE, response).await?;

        verify_contact(query.total_size == 1, query.records.len(), ctx)
    }
}
