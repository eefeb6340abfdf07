use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

/// 会话存储（对 Hook 不透明，可读取或追加键）
pub type Session = Map<String, JsonValue>;

/// 用户属性（可变的资料字段）
pub type Attributes = Map<String, JsonValue>;

/// Hook 调用上下文
///
/// 宿主平台每次调用 Hook 时传入的只读快照。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationContext {
    #[serde(default)]
    pub application: Application,
    #[serde(default)]
    pub oidc_context: OidcContext,
    #[serde(default)]
    pub customer: Customer,
    /// 已注册的认证器（仅 post-identification）
    #[serde(default)]
    pub authenticators: Vec<JsonValue>,
    /// 原始 OIDC 请求的 scope（仅 post-identification）
    #[serde(default)]
    pub requested_scopes: Vec<String>,
    #[serde(default)]
    pub session: Session,
    /// 重定向往返后第二次调用时才会出现
    #[serde(default, alias = "continueContext")]
    pub continue_context: Option<ContinueContext>,
    #[serde(default)]
    pub continue_request_parameters: Option<ContinueRequestParameters>,
}

/// 两阶段续接协议中的阶段
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Continuation<'a> {
    /// 首次调用：发起外部流程
    Initiate,
    /// 用户从外部流程返回：完成校验
    Resume(&'a ContinueContext),
}

impl InvocationContext {
    pub fn new(application: Application, customer: Customer) -> Self {
        Self {
            application,
            customer,
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn with_continue_context(mut self, continue_context: ContinueContext) -> Self {
        self.continue_context = Some(continue_context);
        self
    }

    pub fn continuation(&self) -> Continuation<'_> {
        match &self.continue_context {
            Some(ctx) => Continuation::Resume(ctx),
            None => Continuation::Initiate,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
    #[serde(default)]
    pub name: String,
    /// OAuth client ID
    #[serde(default)]
    pub client_id: String,
}

impl Application {
    pub fn new<N: Into<String>, C: Into<String>>(name: N, client_id: C) -> Self {
        Self {
            name: name.into(),
            client_id: client_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OidcContext {
    #[serde(default)]
    pub acr_values: Vec<String>,
    #[serde(default)]
    pub ui_locales: Vec<String>,
}

/// 用户信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// 来自 X-Forwarded-For 的客户端 IP
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub identifiers: Identifiers,
    #[serde(default)]
    pub consents: Vec<JsonValue>,
    #[serde(default)]
    pub location: Option<Location>,
    /// 已存储的用户信息（post-identification / post-login）
    #[serde(default)]
    pub info: Option<CustomerInfo>,
    #[serde(default)]
    pub groups: Vec<JsonValue>,
}

impl Customer {
    /// 主邮箱：优先 `attributes.emails.primaryEmail`，否则取 `identifiers.email`
    pub fn primary_email(&self) -> Option<&str> {
        self.attributes
            .get("emails")
            .and_then(|emails| emails.get("primaryEmail"))
            .and_then(JsonValue::as_str)
            .filter(|email| !email.is_empty())
            .or(self.identifiers.email.as_deref())
    }

    /// 用户名：优先 `info.userName`，否则取 `identifiers.username`
    pub fn user_name(&self) -> Option<&str> {
        self.info
            .as_ref()
            .and_then(|info| info.user_name.as_deref())
            .or(self.identifiers.username.as_deref())
    }
}

/// 不可变的查找键
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifiers {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(flatten)]
    pub other: HashMap<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "userName")]
    pub user_name: Option<String>,
    #[serde(flatten)]
    pub other: HashMap<String, JsonValue>,
}

/// 地理位置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(default, deserialize_with = "number_or_string")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub longitude: Option<f64>,
}

/// 宿主平台在部分版本中以字符串形式传递坐标
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(value)) => Ok(Some(value)),
        Some(Raw::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Raw::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// 续接上下文（外部流程回调携带的数据）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContinueContext {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, JsonValue>,
}

impl ContinueContext {
    pub fn with_code<T: Into<String>>(code: T) -> Self {
        Self {
            code: Some(code.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContinueRequestParameters {
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// 属性合并：先展开原属性，再用新值覆盖顶层键（只增不删）
pub fn merge_attributes(base: &Attributes, overrides: Attributes) -> Attributes {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key, value);
    }
    merged
}
