//! # 集成领域模型
//!
//! 每种集成的配置。外部服务地址都可配置，便于替换为测试桩。

use serde::Deserialize;

use idp_hooks_core::{ErrorBuilder, ErrorCode, HookKind, Result};

/// 集成配置（按 `type` 区分）
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrationConfig {
    /// 注册前的会话风险评估
    Deduce(DeduceConfig),
    /// CRM 联系人校验
    Hubspot(HubspotConfig),
    Salesforce(SalesforceConfig),
    Servicenow(ServiceNowConfig),
    Dynamics(DynamicsConfig),
    /// 基于重定向的身份核验
    Iddataweb(IdDataWebConfig),
    /// 注册事件投递
    Eventbridge(EventBridgeConfig),
    /// 登录前的风险评分
    Seczetta(SecZettaConfig),
    /// 登录通知
    Slack(SlackConfig),
    /// 登录审计日志
    Splunk(SplunkConfig),
}

impl IntegrationConfig {
    pub fn from_table(table: toml::Table) -> Result<Self> {
        toml::Value::Table(table).try_into().map_err(|err| {
            ErrorBuilder::new(ErrorCode::ConfigurationError, "invalid integration config")
                .details(err.to_string())
                .build_error()
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            IntegrationConfig::Deduce(_) => "deduce",
            IntegrationConfig::Hubspot(_) => "hubspot",
            IntegrationConfig::Salesforce(_) => "salesforce",
            IntegrationConfig::Servicenow(_) => "servicenow",
            IntegrationConfig::Dynamics(_) => "dynamics",
            IntegrationConfig::Iddataweb(_) => "iddataweb",
            IntegrationConfig::Eventbridge(_) => "eventbridge",
            IntegrationConfig::Seczetta(_) => "seczetta",
            IntegrationConfig::Slack(_) => "slack",
            IntegrationConfig::Splunk(_) => "splunk",
        }
    }

    /// 集成所适用的 Hook 类型
    pub fn supported_kind(&self) -> HookKind {
        match self {
            IntegrationConfig::Seczetta(_) => HookKind::PostIdentification,
            IntegrationConfig::Slack(_) | IntegrationConfig::Splunk(_) => {
                HookKind::PostAccountLogin
            }
            _ => HookKind::PreRegistration,
        }
    }

    /// 校验必填凭据非空
    pub fn validate(&self) -> Result<()> {
        match self {
            IntegrationConfig::Deduce(cfg) => {
                require("site", &cfg.site)?;
                require("api_key", &cfg.api_key)
            }
            IntegrationConfig::Hubspot(cfg) => require("access_token", &cfg.access_token),
            IntegrationConfig::Salesforce(cfg) => {
                require("client_id", &cfg.client_id)?;
                require("client_secret", &cfg.client_secret)?;
                require("username", &cfg.username)?;
                require("password", &cfg.password)
            }
            IntegrationConfig::Servicenow(cfg) => {
                require("base_url", &cfg.base_url)?;
                require("client_id", &cfg.client_id)?;
                require("client_secret", &cfg.client_secret)?;
                require("username", &cfg.username)?;
                require("password", &cfg.password)
            }
            IntegrationConfig::Dynamics(cfg) => {
                require("authority_url", &cfg.authority_url)?;
                require("resource", &cfg.resource)?;
                require("client_id", &cfg.client_id)?;
                require("client_secret", &cfg.client_secret)
            }
            IntegrationConfig::Iddataweb(cfg) => {
                require("client_id", &cfg.client_id)?;
                require("client_secret", &cfg.client_secret)?;
                require("platform_url", &cfg.platform_url)
            }
            IntegrationConfig::Eventbridge(cfg) => require("region", &cfg.region),
            IntegrationConfig::Seczetta(cfg) => {
                require("base_url", &cfg.base_url)?;
                require("api_key", &cfg.api_key)?;
                require("attribute_id", &cfg.attribute_id)?;
                require("profile_type_id", &cfg.profile_type_id)?;
                if cfg.maximum_allowed_risk <= 0.0 {
                    return Err(ErrorBuilder::new(
                        ErrorCode::ConfigurationError,
                        "maximum_allowed_risk must be positive",
                    )
                    .build_error());
                }
                Ok(())
            }
            IntegrationConfig::Slack(cfg) => require("webhook_url", &cfg.webhook_url),
            IntegrationConfig::Splunk(cfg) => {
                require("url", &cfg.url)?;
                require("token", &cfg.token)
            }
        }
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ErrorBuilder::new(
            ErrorCode::ConfigurationError,
            &format!("missing required configuration: {field}"),
        )
        .build_error());
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeduceConfig {
    pub site: String,
    pub api_key: String,
    #[serde(default = "default_deduce_url")]
    pub base_url: String,
    #[serde(default = "default_deduce_action")]
    pub action: String,
    /// 测试模式
    #[serde(default = "default_true")]
    pub test: bool,
    /// 视为可信的评分
    #[serde(default = "default_accepted_scores")]
    pub accepted_scores: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubspotConfig {
    pub access_token: String,
    #[serde(default = "default_hubspot_url")]
    pub base_url: String,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SalesforceConfig {
    #[serde(default = "default_salesforce_login_url")]
    pub login_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_salesforce_api_version")]
    pub api_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceNowConfig {
    /// 实例地址，如 `https://acme.service-now.com`
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DynamicsConfig {
    /// 令牌端点，如 `https://login.microsoftonline.com/{tenant}/oauth2/token`
    pub authority_url: String,
    /// 组织地址，如 `https://acme.crm.dynamics.com/`
    pub resource: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_dynamics_api_version")]
    pub api_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdDataWebConfig {
    #[serde(default = "default_iddataweb_url")]
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// 身份平台地址，用于拼接回调地址
    pub platform_url: String,
    #[serde(default = "default_iddataweb_scope")]
    pub scope: String,
}

impl IdDataWebConfig {
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}/login/api/v1/continue",
            self.platform_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventBridgeConfig {
    pub region: String,
    /// 未设置时使用默认凭据链
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_event_bus")]
    pub event_bus_name: String,
    #[serde(default = "default_event_source")]
    pub source: String,
    #[serde(default = "default_detail_type")]
    pub detail_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecZettaConfig {
    /// 实例地址，如 `https://acme.mynonemployee.com`
    pub base_url: String,
    pub api_key: String,
    /// 保存用户名的属性 ID
    pub attribute_id: String,
    pub profile_type_id: String,
    /// 评分达到该值即拒绝
    #[serde(default = "default_maximum_allowed_risk")]
    pub maximum_allowed_risk: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub channel: Option<String>,
    /// 是否对客户端 IP 做反向 DNS 查询
    #[serde(default = "default_true")]
    pub reverse_dns: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplunkConfig {
    /// HEC 地址，如 `https://splunk.example.com:8088`
    pub url: String,
    pub token: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub sourcetype: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_deduce_url() -> String {
    "https://api.deducesecurity.com".to_string()
}

fn default_deduce_action() -> String {
    "auth.success.sso.mfaEnabled".to_string()
}

fn default_accepted_scores() -> Vec<String> {
    vec!["TRUSTED".to_string()]
}

fn default_hubspot_url() -> String {
    "https://api.hubapi.com".to_string()
}

fn default_search_limit() -> u32 {
    100
}

fn default_salesforce_login_url() -> String {
    "https://login.salesforce.com".to_string()
}

fn default_salesforce_api_version() -> String {
    "v58.0".to_string()
}

fn default_dynamics_api_version() -> String {
    "v9.1".to_string()
}

fn default_iddataweb_url() -> String {
    "https://prod1.iddataweb.com/prod-axn/axn/oauth2".to_string()
}

fn default_iddataweb_scope() -> String {
    "openid country.US".to_string()
}

fn default_event_bus() -> String {
    "default".to_string()
}

fn default_event_source() -> String {
    "strivacity".to_string()
}

fn default_detail_type() -> String {
    "CustomerRegistration".to_string()
}

fn default_maximum_allowed_risk() -> f64 {
    6.0
}
