//! # IDDataWeb 身份核验（两阶段重定向流程）
//!
//! 首次调用返回授权地址；用户回到平台后，平台带着 `continue_context.code` 再次调用，
//! 此时换取 `id_token`、校验签名与策略结论，并把核验得到的属性写回用户资料。
//! 换取失败永远不会放行，因此该 Hook 不支持失败放行。

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use url::Url;

use idp_hooks_core::{
    AdditionalAuthenticator, ContinueContext, Continuation, ErrorBuilder, ErrorCode, Hook,
    HookResult, InvocationContext, Result,
};

use super::http::{decode_json, transport_error};
use crate::domain::model::IdDataWebConfig;
use crate::domain::service::VerifiedIdentity;
use crate::infrastructure::jwks::JwksVerifier;
use crate::infrastructure::phone::to_e164;

const SERVICE: &str = "iddataweb";
const APPROVED: &str = "approve";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerificationClaims {
    policy_decision: String,
    #[serde(default)]
    endpoint: Option<EndpointResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndpointResult {
    #[serde(default)]
    endpoint_instance_list: Vec<EndpointInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndpointInstance {
    #[serde(default)]
    user_attributes: Vec<UserAttribute>,
}

#[derive(Debug, Deserialize)]
struct UserAttribute {
    #[serde(default)]
    values: Map<String, JsonValue>,
}

impl VerificationClaims {
    /// 展开所有端点实例中的用户属性，后出现的同名键覆盖先出现的
    fn identity(&self) -> VerifiedIdentity {
        let mut values = HashMap::new();
        let instances = self
            .endpoint
            .iter()
            .flat_map(|endpoint| endpoint.endpoint_instance_list.iter());
        for attribute in instances.flat_map(|instance| instance.user_attributes.iter()) {
            for (key, value) in &attribute.values {
                let text = match value {
                    JsonValue::String(text) => text.clone(),
                    JsonValue::Null => continue,
                    other => other.to_string(),
                };
                values.insert(key.clone(), text);
            }
        }
        VerifiedIdentity::new(values)
    }
}

pub struct IdDataWebHook {
    client: Client,
    config: IdDataWebConfig,
    verifier: JwksVerifier,
}

impl IdDataWebHook {
    pub fn new(client: Client, config: IdDataWebConfig) -> Self {
        let jwks_url = format!("{}/jwks.json", config.base_url.trim_end_matches('/'));
        let verifier = JwksVerifier::new(client.clone(), jwks_url, SERVICE);
        Self {
            client,
            config,
            verifier,
        }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// 授权地址
    pub fn authorize_url(&self) -> Result<String> {
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.base_url()),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("scope", self.config.scope.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.config.redirect_uri().as_str()),
            ],
        )
        .map_err(|err| {
            ErrorBuilder::new(ErrorCode::ConfigurationError, "invalid iddataweb base url")
                .details(err.to_string())
                .build_error()
        })?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<String> {
        let redirect_uri = self.config.redirect_uri();
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let response = self
            .client
            .post(format!("{}/token", self.base_url()))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&form)
            .send()
            .await
            .map_err(|err| transport_error(SERVICE, err))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| transport_error(SERVICE, err))?;

        // 错误响应体同样携带 error / error_description
        let token: TokenResponse = decode_json(SERVICE, &bytes)?;
        if let Some(error) = token.error {
            return Err(
                ErrorBuilder::new(ErrorCode::VerificationFailed, "code exchange rejected")
                    .details(format!(
                        "error={error}, description={}",
                        token.error_description.unwrap_or_default()
                    ))
                    .build_error(),
            );
        }
        if !status.is_success() {
            return Err(
                ErrorBuilder::new(ErrorCode::VerificationFailed, "code exchange rejected")
                    .details(format!("status={}", status.as_u16()))
                    .build_error(),
            );
        }
        token.id_token.ok_or_else(|| {
            ErrorBuilder::new(ErrorCode::VerificationFailed, "token response has no id_token")
                .build_error()
        })
    }

    async fn finalize(
        &self,
        ctx: &InvocationContext,
        continue_context: &ContinueContext,
    ) -> Result<HookResult> {
        let code = continue_context.code.as_deref().ok_or_else(|| {
            ErrorBuilder::new(ErrorCode::VerificationFailed, "continue context has no code")
                .build_error()
        })?;

        let id_token = self.exchange_code(code).await.map_err(as_verification)?;
        let claims: VerificationClaims = self.verifier.verify(&id_token).await?;
        if claims.policy_decision != APPROVED {
            return Err(
                ErrorBuilder::new(ErrorCode::VerificationFailed, "identity not approved")
                    .details(format!("policyDecision={}", claims.policy_decision))
                    .build_error(),
            );
        }

        let identity = claims.identity();
        let phone = identity
            .telephone()
            .ok_or_else(|| {
                ErrorBuilder::new(
                    ErrorCode::DeserializationError,
                    "verified identity has no telephone",
                )
                .build_error()
            })
            .and_then(|raw| to_e164(raw, identity.country()));
        let phone = match phone {
            Ok(phone) => phone,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    details = err.details().unwrap_or_default(),
                    "failed to map verified identity"
                );
                return Ok(HookResult::deny(
                    "registration_failed",
                    "Failed to register account",
                ));
            }
        };

        let attributes = identity.merge_into(
            &ctx.customer.attributes,
            ctx.customer.identifiers.email.as_deref(),
            &phone,
        );
        Ok(HookResult::proceed_with(
            attributes,
            vec![AdditionalAuthenticator::phone(phone)],
            ctx.session.clone(),
        ))
    }
}

/// 换取阶段的任何失败都按校验失败处理
fn as_verification(err: idp_hooks_core::HookError) -> idp_hooks_core::HookError {
    if err.code() == ErrorCode::VerificationFailed {
        return err;
    }
    ErrorBuilder::new(ErrorCode::VerificationFailed, err.message())
        .details(format!(
            "{}: {}",
            err.code(),
            err.details().unwrap_or_default()
        ))
        .build_error()
}

#[async_trait]
impl Hook for IdDataWebHook {
    async fn invoke(&self, ctx: &InvocationContext) -> Result<HookResult> {
        match ctx.continuation() {
            Continuation::Initiate => Ok(HookResult::redirect(
                self.authorize_url()?,
                ctx.session.clone(),
            )),
            Continuation::Resume(continue_context) => self.finalize(ctx, continue_context).await,
        }
    }

    fn supports_fail_open(&self) -> bool {
        false
    }
}
