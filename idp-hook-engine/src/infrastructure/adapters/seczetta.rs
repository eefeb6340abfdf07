//! # SecZetta 风险评分
//!
//! 先按用户名查找人员档案，再读取该档案的风险评分并与上限比较。

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use idp_hooks_core::{ErrorBuilder, ErrorCode, Hook, HookResult, InvocationContext, Result};

use super::http::{read_json, transport_error};
use crate::domain::model::SecZettaConfig;
use crate::domain::service::{RiskPolicy, require_user_name};

const SERVICE: &str = "seczetta";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    profiles: Vec<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    id: JsonValue,
}

#[derive(Debug, Deserialize)]
struct RiskScoresResponse {
    risk_scores: Vec<RiskScore>,
}

#[derive(Debug, Deserialize)]
struct RiskScore {
    overall_score: f64,
}

pub struct SecZettaHook {
    client: Client,
    config: SecZettaConfig,
    policy: RiskPolicy,
}

impl SecZettaHook {
    pub fn new(client: Client, config: SecZettaConfig) -> Self {
        let policy = RiskPolicy::new(config.maximum_allowed_risk);
        Self {
            client,
            config,
            policy,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Token token={}", self.config.api_key))
            .header("Accept", "application/json")
    }

    async fn find_profile(&self, user_name: &str) -> Result<String> {
        let body = json!({
            "advanced_search": {
                "label": "All Contractors",
                "condition_rules_attributes": [
                    {
                        "type": "ProfileTypeRule",
                        "comparison_operator": "==",
                        "value": self.config.profile_type_id,
                    },
                    {
                        "type": "ProfileAttributeRule",
                        "condition_object_id": self.config.attribute_id,
                        "object_type": "NeAttribute",
                        "comparison_operator": "==",
                        "value": user_name,
                    }
                ]
            }
        });

        let response = self
            .authorized(self.client.post(self.url("/api/advanced_search/run")))
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error(SERVICE, err))?;
        let search: SearchResponse = read_json(SERVICE, response).await?;

        let profile = search.profiles.into_iter().next().ok_or_else(|| {
            ErrorBuilder::new(ErrorCode::ServiceUnavailable, "failed to retrieve profile")
                .details(format!("user={user_name}"))
                .build_error()
        })?;
        Ok(match profile.id {
            JsonValue::String(id) => id,
            other => other.to_string(),
        })
    }

    async fn latest_score(&self, profile_id: &str) -> Result<f64> {
        let response = self
            .authorized(self.client.get(self.url("/api/risk_scores")))
            .query(&[("object_id", profile_id)])
            .send()
            .await
            .map_err(|err| transport_error(SERVICE, err))?;
        let scores: RiskScoresResponse = read_json(SERVICE, response).await?;

        scores
            .risk_scores
            .last()
            .map(|score| score.overall_score)
            .ok_or_else(|| {
                ErrorBuilder::new(ErrorCode::DeserializationError, "no risk score returned")
                    .details(format!("object_id={profile_id}"))
                    .build_error()
            })
    }
}

#[async_trait]
impl Hook for SecZettaHook {
    async fn invoke(&self, ctx: &InvocationContext) -> Result<HookResult> {
        let user_name = require_user_name(ctx)?;
        let profile_id = self.find_profile(user_name).await?;
        let score = self.latest_score(&profile_id).await?;
        tracing::debug!(profile = %profile_id, score, "seczetta risk score received");
        Ok(self.policy.evaluate(score, ctx))
    }
}
