mod common;

use mockito::{Matcher, Server};
use reqwest::Client;
use serde_json::json;

use idp_hook_engine::domain::model::{
    DynamicsConfig, HubspotConfig, SalesforceConfig, ServiceNowConfig,
};
use idp_hook_engine::infrastructure::adapters::{
    DynamicsHook, HubspotHook, SalesforceHook, ServiceNowHook,
};
use idp_hooks_core::{FailurePolicy, HookKind, HookResult};

use common::{UNREACHABLE_URL, context, run};

fn hubspot(base_url: &str) -> HubspotHook {
    HubspotHook::new(
        Client::new(),
        HubspotConfig {
            access_token: "hs-token".to_string(),
            base_url: base_url.to_string(),
            limit: 100,
        },
    )
}

fn salesforce(login_url: &str) -> SalesforceHook {
    SalesforceHook::new(
        Client::new(),
        SalesforceConfig {
            login_url: login_url.to_string(),
            client_id: "sf-client".to_string(),
            client_secret: "sf-secret".to_string(),
            username: "api@acme.com".to_string(),
            password: "pw".to_string(),
            api_version: "v58.0".to_string(),
        },
    )
}

fn servicenow(base_url: &str) -> ServiceNowHook {
    ServiceNowHook::new(
        Client::new(),
        ServiceNowConfig {
            base_url: base_url.to_string(),
            client_id: "sn-client".to_string(),
            client_secret: "sn-secret".to_string(),
            username: "api".to_string(),
            password: "pw".to_string(),
        },
    )
}

fn dynamics(base_url: &str) -> DynamicsHook {
    DynamicsHook::new(
        Client::new(),
        DynamicsConfig {
            authority_url: format!("{base_url}/tenant/oauth2/token"),
            resource: base_url.to_string(),
            client_id: "dyn-client".to_string(),
            client_secret: "dyn-secret".to_string(),
            api_version: "v9.1".to_string(),
        },
    )
}

#[tokio::test]
async fn test_hubspot_single_record_continues_unchanged() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/crm/v3/objects/contacts/search")
        .match_header("authorization", "Bearer hs-token")
        .match_body(Matcher::PartialJson(json!({
            "filterGroups": [{
                "filters": [{ "propertyName": "email", "operator": "EQ", "value": "a@b.com" }]
            }]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"total":1,"results":[{"id":"101","properties":{"email":"a@b.com"}}]}"#)
        .create_async()
        .await;

    let ctx = context("a@b.com");
    let result = run(
        hubspot(&server.url()),
        HookKind::PreRegistration,
        FailurePolicy::FailClosed,
        &ctx,
    )
    .await;

    mock.assert_async().await;
    assert_eq!(result, HookResult::proceed(&ctx));
}

#[tokio::test]
async fn test_hubspot_no_record_shows_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/crm/v3/objects/contacts/search")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"total":0,"results":[]}"#)
        .create_async()
        .await;

    let ctx = context("nobody@b.com");
    let result = run(
        hubspot(&server.url()),
        HookKind::PreRegistration,
        FailurePolicy::FailOpen,
        &ctx,
    )
    .await;

    assert_eq!(
        result,
        HookResult::show_error("This account could not be verified.", ctx.session.clone())
    );
}

#[tokio::test]
async fn test_hubspot_repeated_invocations_agree() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/crm/v3/objects/contacts/search")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"results":[{"id":"101"}]}"#)
        .expect(2)
        .create_async()
        .await;

    let ctx = context("a@b.com");
    let plan = common::plan(
        hubspot(&server.url()),
        HookKind::PreRegistration,
        FailurePolicy::FailClosed,
    );
    let first = plan.execute(&ctx).await;
    let second = plan.execute(&ctx).await;

    mock.assert_async().await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_unreachable_collaborator_follows_failure_policy() {
    let ctx = context("a@b.com");

    let open = run(
        hubspot(UNREACHABLE_URL),
        HookKind::PreRegistration,
        FailurePolicy::FailOpen,
        &ctx,
    )
    .await;
    assert_eq!(open, HookResult::proceed(&ctx));

    let closed = run(
        hubspot(UNREACHABLE_URL),
        HookKind::PreRegistration,
        FailurePolicy::FailClosed,
        &ctx,
    )
    .await;
    assert!(matches!(closed, HookResult::Deny { ref error, .. } if error == "service_unavailable"));
}

#[tokio::test]
async fn test_hubspot_server_error_denies_when_fail_closed() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/crm/v3/objects/contacts/search")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let ctx = context("a@b.com");
    let result = run(
        hubspot(&server.url()),
        HookKind::PreRegistration,
        FailurePolicy::FailClosed,
        &ctx,
    )
    .await;

    assert_eq!(
        result,
        HookResult::deny("service_unavailable", "hubspot returned status 500")
    );
}

#[tokio::test]
async fn test_missing_email_is_a_configuration_deny() {
    let mut ctx = context("a@b.com");
    ctx.customer.attributes.clear();
    ctx.customer.identifiers.email = None;

    // 不会发出请求
    let result = run(
        hubspot(UNREACHABLE_URL),
        HookKind::PreRegistration,
        FailurePolicy::FailOpen,
        &ctx,
    )
    .await;
    assert!(matches!(result, HookResult::Deny { ref error, .. } if error == "invalid_context"));
}

#[tokio::test]
async fn test_salesforce_exactly_one_contact() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let token = server
        .mock("POST", "/services/oauth2/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "password".into()),
            Matcher::UrlEncoded("username".into(), "api@acme.com".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({ "access_token": "sf-access", "instance_url": url }).to_string(),
        )
        .create_async()
        .await;
    let query = server
        .mock("GET", "/services/data/v58.0/query")
        .match_header("authorization", "Bearer sf-access")
        .match_query(Matcher::UrlEncoded(
            "q".into(),
            "SELECT Id FROM Contact WHERE Email = 'a@b.com'".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"totalSize":1,"done":true,"records":[{"Id":"003xx"}]}"#)
        .create_async()
        .await;

    let ctx = context("a@b.com");
    let result = run(
        salesforce(&server.url()),
        HookKind::PreRegistration,
        FailurePolicy::FailClosed,
        &ctx,
    )
    .await;

    token.assert_async().await;
    query.assert_async().await;
    assert_eq!(result, HookResult::proceed(&ctx));
}

#[tokio::test]
async fn test_salesforce_duplicate_contacts_are_not_verified() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let _token = server
        .mock("POST", "/services/oauth2/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({ "access_token": "sf-access", "instance_url": url }).to_string(),
        )
        .create_async()
        .await;
    let _query = server
        .mock("GET", "/services/data/v58.0/query")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"totalSize":2,"records":[{"Id":"1"},{"Id":"2"}]}"#)
        .create_async()
        .await;

    let ctx = context("a@b.com");
    let result = run(
        salesforce(&server.url()),
        HookKind::PreRegistration,
        FailurePolicy::FailClosed,
        &ctx,
    )
    .await;
    assert!(matches!(result, HookResult::ShowError { .. }));
}

#[tokio::test]
async fn test_salesforce_rejected_credentials() {
    let mut server = Server::new_async().await;
    let _token = server
        .mock("POST", "/services/oauth2/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"invalid_grant","error_description":"authentication failure"}"#)
        .create_async()
        .await;

    let ctx = context("a@b.com");
    let result = run(
        salesforce(&server.url()),
        HookKind::PreRegistration,
        FailurePolicy::FailClosed,
        &ctx,
    )
    .await;
    assert_eq!(
        result,
        HookResult::deny("authentication_failed", "Failed to authenticate to salesforce.")
    );
}

#[tokio::test]
async fn test_servicenow_without_contacts_shows_error() {
    let mut server = Server::new_async().await;
    let _token = server
        .mock("POST", "/oauth_token.do")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"sn-access","token_type":"Bearer"}"#)
        .create_async()
        .await;
    let contacts = server
        .mock("GET", "/api/now/contact")
        .match_header("authorization", "Bearer sn-access")
        .match_query(Matcher::UrlEncoded("sysparm_query".into(), "email=a@b.com".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"result":[]}"#)
        .create_async()
        .await;

    let ctx = context("a@b.com");
    let result = run(
        servicenow(&server.url()),
        HookKind::PreRegistration,
        FailurePolicy::FailClosed,
        &ctx,
    )
    .await;

    contacts.assert_async().await;
    assert!(matches!(result, HookResult::ShowError { .. }));
}

#[tokio::test]
async fn test_dynamics_contact_found() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let token = server
        .mock("POST", "/tenant/oauth2/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
            Matcher::UrlEncoded("resource".into(), url.clone()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"dyn-access"}"#)
        .create_async()
        .await;
    let contacts = server
        .mock("GET", "/api/data/v9.1/contacts")
        .match_header("authorization", "Bearer dyn-access")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("$select".into(), "fullname".into()),
            Matcher::UrlEncoded("$filter".into(), "emailaddress1 eq 'a@b.com'".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"value":[{"fullname":"Jane Doe"}]}"#)
        .create_async()
        .await;

    let ctx = context("a@b.com");
    let result = run(
        dynamics(&url),
        HookKind::PreRegistration,
        FailurePolicy::FailClosed,
        &ctx,
    )
    .await;

    token.assert_async().await;
    contacts.assert_async().await;
    assert_eq!(result, HookResult::proceed(&ctx));
}

#[tokio::test]
async fn test_salesforce_quotes_in_email_stay_inside_literal() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let _token = server
        .mock("POST", "/services/oauth2/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({ "access_token": "sf-access", "instance_url": url }).to_string(),
        )
        .create_async()
        .await;
    let query = server
        .mock("GET", "/services/data/v58.0/query")
        .match_query(Matcher::UrlEncoded(
            "q".into(),
            r"SELECT Id FROM Contact WHERE Email = 'x\' OR Email != \'y@b.com'".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"totalSize":0,"records":[]}"#)
        .create_async()
        .await;

    let ctx = context("x' OR Email != 'y@b.com");
    let result = run(
        salesforce(&server.url()),
        HookKind::PreRegistration,
        FailurePolicy::FailClosed,
        &ctx,
    )
    .await;

    query.assert_async().await;
    assert!(matches!(result, HookResult::ShowError { .. }));
}

#[tokio::test]
async fn test_dynamics_quotes_in_email_are_doubled() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let _token = server
        .mock("POST", "/tenant/oauth2/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"dyn-access"}"#)
        .create_async()
        .await;
    let contacts = server
        .mock("GET", "/api/data/v9.1/contacts")
        .match_query(Matcher::UrlEncoded(
            "$filter".into(),
            "emailaddress1 eq 'x'' or emailaddress1 ne ''y@b.com'".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"value":[]}"#)
        .create_async()
        .await;

    let ctx = context("x' or emailaddress1 ne 'y@b.com");
    let result = run(
        dynamics(&url),
        HookKind::PreRegistration,
        FailurePolicy::FailClosed,
        &ctx,
    )
    .await;

    contacts.assert_async().await;
    assert!(matches!(result, HookResult::ShowError { .. }));
}

#[tokio::test]
async fn test_servicenow_query_separator_in_email_is_rejected() {
    let mut server = Server::new_async().await;
    let token = server
        .mock("POST", "/oauth_token.do")
        .expect(0)
        .create_async()
        .await;
    let contacts = server
        .mock("GET", "/api/now/contact")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"result":[{"email":"victim@corp.com"}]}"#)
        .expect(0)
        .create_async()
        .await;

    let ctx = context("a^ORemail=victim@corp.com");
    // 失败放行也不会放行
    let result = run(
        servicenow(&server.url()),
        HookKind::PreRegistration,
        FailurePolicy::FailOpen,
        &ctx,
    )
    .await;

    token.assert_async().await;
    contacts.assert_async().await;
    assert!(matches!(result, HookResult::Deny { ref error, .. } if error == "invalid_context"));
}
