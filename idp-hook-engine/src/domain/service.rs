//! # 集成领域服务
//!
//! 与具体外部服务无关的判定规则：联系人校验、风险阈值、会话信任与身份属性映射。

use std::collections::HashMap;

use serde_json::json;

use idp_hooks_core::{
    Attributes, ErrorBuilder, ErrorCode, HookResult, InvocationContext, Result, merge_attributes,
};

/// 未找到联系人时展示给终端用户的提示
pub const UNVERIFIED_ACCOUNT_MESSAGE: &str = "This account could not be verified.";

/// 会话不可信时的拒绝码与描述
pub const UNTRUSTED_SESSION_CODE: &str = "1";
pub const UNTRUSTED_SESSION_DESCRIPTION: &str = "User session is not trusted.";

pub fn require_primary_email(ctx: &InvocationContext) -> Result<&str> {
    ctx.customer.primary_email().ok_or_else(|| {
        ErrorBuilder::new(ErrorCode::InvalidContext, "customer has no primary email")
            .build_error()
    })
}

pub fn require_user_name(ctx: &InvocationContext) -> Result<&str> {
    ctx.customer.user_name().ok_or_else(|| {
        ErrorBuilder::new(ErrorCode::InvalidContext, "customer has no user name").build_error()
    })
}

/// CRM 联系人校验：匹配则原样放行，否则返回面向用户的未找到错误
pub fn verify_contact(matched: bool, records: usize, ctx: &InvocationContext) -> Result<HookResult> {
    if !matched {
        return Err(
            ErrorBuilder::new(ErrorCode::NotFound, UNVERIFIED_ACCOUNT_MESSAGE)
                .details(format!("records={records}"))
                .build_error(),
        );
    }
    Ok(HookResult::proceed(ctx))
}

/// 会话信任判定
pub fn assess_trust(score: &str, accepted: &[String], ctx: &InvocationContext) -> HookResult {
    if accepted.iter().any(|candidate| candidate == score) {
        HookResult::proceed(ctx)
    } else {
        HookResult::deny(UNTRUSTED_SESSION_CODE, UNTRUSTED_SESSION_DESCRIPTION)
    }
}

/// 风险阈值策略
#[derive(Debug, Clone, Copy)]
pub struct RiskPolicy {
    pub maximum_allowed: f64,
}

impl RiskPolicy {
    pub fn new(maximum_allowed: f64) -> Self {
        Self { maximum_allowed }
    }

    /// 评分达到或超过上限即拒绝
    pub fn evaluate(&self, score: f64, ctx: &InvocationContext) -> HookResult {
        if score >= self.maximum_allowed {
            tracing::info!(
                score,
                maximum = self.maximum_allowed,
                "risk score reaches the maximum"
            );
            return HookResult::show_error(
                format!(
                    "A {score} risk score is too high. Maximum acceptable risk is {}",
                    self.maximum_allowed
                ),
                ctx.session.clone(),
            );
        }
        HookResult::allow(ctx.session.clone())
    }
}

/// 身份核验服务返回的用户属性（已展开为键值）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifiedIdentity {
    values: HashMap<String, String>,
}

impl VerifiedIdentity {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn telephone(&self) -> Option<&str> {
        self.get("telephone")
    }

    pub fn country(&self) -> Option<&str> {
        self.get("country")
    }

    fn street_address(&self) -> Option<String> {
        let parts: Vec<&str> = [self.get("street_number"), self.get("route")]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }

    /// 把核验结果合并进用户属性
    ///
    /// 原有属性保留，核验得到的姓名、邮箱、电话、地址与国家覆盖同名顶层键。
    pub fn merge_into(&self, base: &Attributes, email: Option<&str>, phone_e164: &str) -> Attributes {
        let overrides = json!({
            "name": {
                "givenName": self.get("fname"),
                "middleName": self.get("mname"),
                "familyName": self.get("lname"),
            },
            "emails": {
                "primaryEmail": email,
            },
            "phoneNumbers": {
                "primaryPhoneNumber": phone_e164,
            },
            "addresses": {
                "primary": {
                    "city": self.get("locality"),
                    "postalCode": self.get("postal_code"),
                    "region": self.get("administrative_area_level_1"),
                    "streetAddress": self.street_address(),
                },
            },
            "country": self.country(),
        });

        match overrides {
            serde_json::Value::Object(map) => merge_attributes(base, map),
            _ => base.clone(),
        }
    }
}
