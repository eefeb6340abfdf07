//! # Deduce 会话风险评估

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use idp_hooks_core::{ErrorBuilder, ErrorCode, Hook, HookResult, InvocationContext, Result};

use super::http::{read_json, transport_error};
use crate::domain::model::DeduceConfig;
use crate::domain::service::assess_trust;

const SERVICE: &str = "deduce";

#[derive(Debug, Serialize)]
struct InsightsRequest<'a> {
    site: &'a str,
    apikey: &'a str,
    ip: Option<&'a str>,
    email: &'a str,
    action: &'a str,
    test: String,
}

#[derive(Debug, Deserialize)]
struct InsightsResponse {
    data: InsightsData,
}

#[derive(Debug, Deserialize)]
struct InsightsData {
    score: String,
}

pub struct DeduceHook {
    client: Client,
    config: DeduceConfig,
}

impl DeduceHook {
    pub fn new(client: Client, config: DeduceConfig) -> Self {
        Self { client, config }
    }

    async fn fetch_score(&self, ctx: &InvocationContext, email: &str) -> Result<String> {
        let url = format!("{}/insights", self.config.base_url.trim_end_matches('/'));
        let body = InsightsRequest {
            site: &self.config.site,
            apikey: &self.config.api_key,
            ip: ctx.customer.ip_address.as_deref(),
            email,
            action: &self.config.action,
            test: self.config.test.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error(SERVICE, err))?;
        let insights: InsightsResponse = read_json(SERVICE, response).await?;
        Ok(insights.data.score)
    }
}

#[async_trait]
impl Hook for DeduceHook {
    async fn invoke(&self, ctx: &InvocationContext) -> Result<HookResult> {
        let email = ctx.customer.identifiers.email.as_deref().ok_or_else(|| {
            ErrorBuilder::new(ErrorCode::InvalidContext, "customer has no email identifier")
                .build_error()
        })?;

        let score = self.fetch_score(ctx, email).await?;
        tracing::debug!(score = %score, "deduce insights received");
        Ok(assess_trust(&score, &self.config.accepted_scores, ctx))
    }
}
