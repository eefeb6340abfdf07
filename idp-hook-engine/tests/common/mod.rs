#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use idp_hooks_core::{
    Application, Customer, FailurePolicy, Hook, HookKind, HookMetadata, HookPlan, HookResult,
    Identifiers, InvocationContext, Location,
};

/// 连接会被拒绝的地址
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:1";

pub fn customer(email: &str) -> Customer {
    let mut customer = Customer {
        ip_address: Some("203.0.113.7".to_string()),
        identifiers: Identifiers {
            email: Some(email.to_string()),
            username: Some("jane.doe".to_string()),
            ..Default::default()
        },
        location: Some(Location {
            city: Some("Mountain View".to_string()),
            state: Some("CA".to_string()),
            country: Some("United States".to_string()),
            country_code: Some("US".to_string()),
            coordinates: None,
        }),
        ..Default::default()
    };
    customer
        .attributes
        .insert("emails".to_string(), json!({ "primaryEmail": email }));
    customer
}

pub fn context(email: &str) -> InvocationContext {
    let mut ctx = InvocationContext::new(Application::new("Portal", "portal-client"), customer(email));
    ctx.session.insert("trace".to_string(), json!("abc"));
    ctx
}

pub fn plan<H: Hook + 'static>(hook: H, kind: HookKind, policy: FailurePolicy) -> HookPlan {
    let metadata = HookMetadata::default()
        .with_name("under-test")
        .with_kind(kind)
        .with_timeout(Duration::from_secs(5))
        .with_failure_policy(policy);
    HookPlan::new(metadata, Arc::new(hook))
}

pub async fn run<H: Hook + 'static>(
    hook: H,
    kind: HookKind,
    policy: FailurePolicy,
    ctx: &InvocationContext,
) -> HookResult {
    plan(hook, kind, policy).execute(ctx).await
}
