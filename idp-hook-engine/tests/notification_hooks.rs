mod common;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockito::{Matcher, Server};
use reqwest::Client;
use serde_json::json;
use tokio::sync::mpsc;

use idp_hook_engine::domain::model::{EventBridgeConfig, SlackConfig, SplunkConfig};
use idp_hook_engine::infrastructure::adapters::{
    EventBridgeHook, EventEnvelope, EventPublisher, SlackHook, SplunkHook,
};
use idp_hook_engine::infrastructure::dns::ReverseResolver;
use idp_hooks_core::{ErrorBuilder, ErrorCode, FailurePolicy, HookKind, HookResult, Result};

use common::{context, run};

struct StaticResolver(&'static str);

#[async_trait]
impl ReverseResolver for StaticResolver {
    async fn reverse(&self, _ip: IpAddr) -> Option<String> {
        Some(self.0.to_string())
    }
}

struct ChannelPublisher(mpsc::UnboundedSender<EventEnvelope>);

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, event: EventEnvelope) -> Result<()> {
        let _ = self.0.send(event);
        Ok(())
    }
}

struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _event: EventEnvelope) -> Result<()> {
        Err(ErrorBuilder::new(ErrorCode::ServiceUnavailable, "eventbridge put_events failed").build_error())
    }
}

fn eventbridge_config() -> EventBridgeConfig {
    EventBridgeConfig {
        region: "us-east-1".to_string(),
        access_key_id: None,
        secret_access_key: None,
        endpoint_url: None,
        event_bus_name: "registrations".to_string(),
        source: "strivacity".to_string(),
        detail_type: "CustomerRegistration".to_string(),
    }
}

#[tokio::test]
async fn test_slack_message_includes_resolved_domain() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/services/T000/B000/XXXX")
        .match_body(Matcher::PartialJson(json!({
            "text": "User completed login",
            "channel": "#logins",
            "attachments": [{
                "fields": [
                    { "title": "Application Name", "value": "Portal" },
                    { "title": "User ID", "value": "jane.doe" },
                    { "title": "IP", "value": "203.0.113.7 (host.example.com)" }
                ]
            }]
        })))
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;

    let hook = SlackHook::new(
        Client::new(),
        SlackConfig {
            webhook_url: format!("{}/services/T000/B000/XXXX", server.url()),
            channel: Some("#logins".to_string()),
            reverse_dns: true,
        },
        Arc::new(StaticResolver("host.example.com")),
    );
    let ctx = context("a@b.com");
    let result = run(hook, HookKind::PostAccountLogin, FailurePolicy::FailClosed, &ctx).await;

    mock.assert_async().await;
    assert_eq!(result, HookResult::proceed(&ctx));
}

#[tokio::test]
async fn test_slack_without_reverse_dns_sends_plain_ip() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_body(Matcher::PartialJson(json!({
            "attachments": [{
                "fields": [
                    { "title": "Application Name" },
                    { "title": "User ID" },
                    { "title": "IP", "value": "203.0.113.7" }
                ]
            }]
        })))
        .with_status(200)
        .create_async()
        .await;

    let hook = SlackHook::new(
        Client::new(),
        SlackConfig {
            webhook_url: format!("{}/hook", server.url()),
            channel: None,
            reverse_dns: false,
        },
        Arc::new(StaticResolver("never-used.example.com")),
    );
    let ctx = context("a@b.com");
    run(hook, HookKind::PostAccountLogin, FailurePolicy::FailClosed, &ctx).await;
    mock.assert_async().await;
}

#[tokio::test]
async fn test_splunk_event_posted_to_collector() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/services/collector/event")
        .match_header("authorization", "Splunk hec-token")
        .match_body(Matcher::PartialJson(json!({
            "sourcetype": "_json",
            "event": {
                "message": {
                    "action": "login",
                    "user": "jane.doe",
                    "src_ip": "203.0.113.7",
                    "application": "Portal",
                    "location": { "city": "Mountain View", "country_code": "US" }
                }
            }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"text":"Success","code":0}"#)
        .create_async()
        .await;

    let hook = SplunkHook::new(
        Client::new(),
        SplunkConfig {
            url: server.url(),
            token: "hec-token".to_string(),
            source: None,
            sourcetype: Some("_json".to_string()),
        },
    );
    let ctx = context("a@b.com");
    let result = run(hook, HookKind::PostAccountLogin, FailurePolicy::FailClosed, &ctx).await;

    mock.assert_async().await;
    assert_eq!(result, HookResult::proceed(&ctx));
}

#[tokio::test]
async fn test_splunk_outage_fails_open() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/services/collector/event")
        .with_status(503)
        .create_async()
        .await;

    let hook = SplunkHook::new(
        Client::new(),
        SplunkConfig {
            url: server.url(),
            token: "hec-token".to_string(),
            source: None,
            sourcetype: None,
        },
    );
    let ctx = context("a@b.com");
    let result = run(hook, HookKind::PostAccountLogin, FailurePolicy::FailOpen, &ctx).await;
    assert_eq!(result, HookResult::proceed(&ctx));
}

#[tokio::test]
async fn test_eventbridge_publishes_registration_in_background() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let hook = EventBridgeHook::new(eventbridge_config(), Arc::new(ChannelPublisher(tx)));

    let ctx = context("a@b.com");
    let result = run(hook, HookKind::PreRegistration, FailurePolicy::FailClosed, &ctx).await;
    assert_eq!(result, HookResult::proceed(&ctx));

    let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.event_bus_name, "registrations");
    assert_eq!(event.source, "strivacity");
    assert_eq!(event.detail_type, "CustomerRegistration");
    assert_eq!(event.detail["E-mail"], json!("a@b.com"));
    assert_eq!(event.detail["Application"], json!("Portal"));
    assert_eq!(event.detail["Location"]["Country Code"], json!("US"));
    assert_eq!(event.detail["Location"]["Latitude"], json!(null));
}

#[tokio::test]
async fn test_eventbridge_failure_does_not_block_registration() {
    let hook = EventBridgeHook::new(eventbridge_config(), Arc::new(FailingPublisher));
    let ctx = context("a@b.com");
    let result = run(hook, HookKind::PreRegistration, FailurePolicy::FailClosed, &ctx).await;
    assert_eq!(result, HookResult::proceed(&ctx));
}
