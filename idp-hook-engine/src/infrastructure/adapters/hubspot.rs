//! # HubSpot 联系人校验

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use idp_hooks_core::{Hook, HookResult, InvocationContext, Result};

use super::http::{read_json, transport_error};
use crate::domain::model::HubspotConfig;
use crate::domain::service::{require_primary_email, verify_contact};

const SERVICE: &str = "hubspot";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<JsonValue>,
}

pub struct HubspotHook {
    client: Client,
    config: HubspotConfig,
}

impl HubspotHook {
    pub fn new(client: Client, config: HubspotConfig) -> Self {
        Self { client, config }
    }

    fn search_body(&self, email: &str) -> JsonValue {
        json!({
            "filterGroups": [{
                "filters": [{ "propertyName": "email", "operator": "EQ", "value": email }]
            }],
            "sorts": [{ "propertyName": "createdate", "direction": "DESCENDING" }],
            "query": email,
            "properties": ["email"],
            "limit": self.config.limit,
            "after": 0,
        })
    }
}

#[async_trait]
impl Hook for HubspotHook {
    async fn invoke(&self, ctx: &InvocationContext) -> Result<HookResult> {
        let email = require_primary_email(ctx)?;
        let url = format!(
            "{}/crm/v3/objects/contacts/search",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(&self.search_body(email))
            .send()
            .await
            .map_err(|err| transport_error(SERVICE, err))?;
        let search: SearchResponse = read_json(SERVICE, response).await?;

        let records = search.results.len();
        verify_contact(records > 0, records, ctx)
    }
}
