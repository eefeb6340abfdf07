//! # ServiceNow 联系人校验

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use idp_hooks_core::{ErrorBuilder, ErrorCode, Hook, HookResult, InvocationContext, Result};

use super::http::{read_json, transport_error};
use crate::domain::model::ServiceNowConfig;
use crate::domain::service::{require_primary_email, verify_contact};

const SERVICE: &str = "servicenow";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ContactResponse {
    result: Vec<JsonValue>,
}

pub struct ServiceNowHook {
    client: Client,
    config: ServiceNowConfig,
}

impl ServiceNowHook {
    pub fn new(client: Client, config: ServiceNowConfig) -> Self {
        Self { client, config }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn access_token(&self) -> Result<String> {
        let url = format!("{}/oauth_token.do", self.base_url());
        let form = [
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|err| transport_error(SERVICE, err))?;
        let token = read_json::<TokenResponse>(SERVICE, response)
            .await
            .map_err(|err| {
                ErrorBuilder::new(
                    ErrorCode::AuthenticationFailed,
                    "Failed to authenticate to servicenow.",
                )
                .details(err.to_string())
                .build_error()
            })?;
        Ok(token.access_token)
    }
}

/// encoded query 以 `^` 连接条件，值中不允许出现
fn email_query(email: &str) -> Result<String> {
    if email.contains('^') {
        return Err(ErrorBuilder::new(
            ErrorCode::InvalidContext,
            "primary email contains a reserved query character",
        )
        .details("servicenow encoded queries use '^' as a separator")
        .build_error());
    }
    Ok(format!("email={email}"))
}

#[async_trait]
impl Hook for ServiceNowHook {
    async fn invoke(&self, ctx: &InvocationContext) -> Result<HookResult> {
        let query = email_query(require_primary_email(ctx)?)?;
        let token = self.access_token().await?;

        let url = format!("{}/api/now/contact", self.base_url());
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("sysparm_query", query.as_str())])
            .send()
            .await
            .map_err(|err| transport_error(SERVICE, err))?;
        let contacts: ContactResponse = read_json(SERVICE, response).await?;

        let records = contacts.result.len();
        verify_contact(records > 0, records, ctx)
    }
}
