use std::fmt;

use serde::{Deserialize, Serialize};

use super::context::{Attributes, InvocationContext, Session};
use super::types::HookKind;

/// 附加认证器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthenticatorType {
    Email,
    Phone,
}

/// Hook 已独立验证过的新联系渠道，随 Continue 结果一起注册
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalAuthenticator {
    #[serde(rename = "type")]
    pub kind: AuthenticatorType,
    pub target: String,
}

impl AdditionalAuthenticator {
    pub fn phone<T: Into<String>>(number: T) -> Self {
        Self {
            kind: AuthenticatorType::Phone,
            target: number.into(),
        }
    }

    pub fn email<T: Into<String>>(address: T) -> Self {
        Self {
            kind: AuthenticatorType::Email,
            target: address.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthenticationDecision {
    #[default]
    Allow,
}

/// Hook 执行结果
///
/// 每次调用恰好产生一个结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HookResult {
    /// 放行，可携带更新后的属性与附加认证器
    #[serde(rename_all = "camelCase")]
    Continue {
        attributes: Attributes,
        #[serde(default)]
        additional_authenticators: Vec<AdditionalAuthenticator>,
        #[serde(default)]
        session: Session,
    },
    /// 仅用于 post-identification
    #[serde(rename_all = "camelCase")]
    AllowAuthentication {
        #[serde(default)]
        authentication: AuthenticationDecision,
        #[serde(default)]
        session: Session,
        allow_remembered_authenticators: bool,
        #[serde(default)]
        authenticators_to_ignore: Vec<String>,
    },
    /// 交给外部流程，用户返回后平台会带着续接上下文再次调用
    #[serde(rename_all = "camelCase")]
    Redirect {
        redirect_url: String,
        #[serde(default)]
        session: Session,
    },
    /// 面向终端用户的软失败
    #[serde(rename_all = "camelCase")]
    ShowError {
        error_message: String,
        #[serde(default)]
        session: Session,
    },
    /// 面向机器/日志的硬失败
    Deny { error: String, description: String },
}

impl HookResult {
    /// 原样放行：属性不变，无附加认证器
    pub fn proceed(ctx: &InvocationContext) -> Self {
        HookResult::Continue {
            attributes: ctx.customer.attributes.clone(),
            additional_authenticators: Vec::new(),
            session: ctx.session.clone(),
        }
    }

    pub fn proceed_with(
        attributes: Attributes,
        additional_authenticators: Vec<AdditionalAuthenticator>,
        session: Session,
    ) -> Self {
        HookResult::Continue {
            attributes,
            additional_authenticators,
            session,
        }
    }

    pub fn allow(session: Session) -> Self {
        HookResult::AllowAuthentication {
            authentication: AuthenticationDecision::Allow,
            session,
            allow_remembered_authenticators: true,
            authenticators_to_ignore: Vec::new(),
        }
    }

    pub fn redirect<T: Into<String>>(redirect_url: T, session: Session) -> Self {
        HookResult::Redirect {
            redirect_url: redirect_url.into(),
            session,
        }
    }

    pub fn show_error<T: Into<String>>(message: T, session: Session) -> Self {
        HookResult::ShowError {
            error_message: message.into(),
            session,
        }
    }

    pub fn deny<E: Into<String>, D: Into<String>>(error: E, description: D) -> Self {
        HookResult::Deny {
            error: error.into(),
            description: description.into(),
        }
    }

    /// 失败放行策略下，按 Hook 类型选择的放行结果
    pub fn pass_through(kind: HookKind, ctx: &InvocationContext) -> Self {
        match kind {
            HookKind::PostIdentification => HookResult::allow(ctx.session.clone()),
            HookKind::PreRegistration | HookKind::PostAccountLogin => HookResult::proceed(ctx),
        }
    }

    /// 是否允许流程继续
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            HookResult::Continue { .. } | HookResult::AllowAuthentication { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            HookResult::Continue { .. } => "continue",
            HookResult::AllowAuthentication { .. } => "allow_authentication",
            HookResult::Redirect { .. } => "redirect",
            HookResult::ShowError { .. } => "show_error",
            HookResult::Deny { .. } => "deny",
        }
    }
}

impl fmt::Display for HookResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookResult::Redirect { redirect_url, .. } => write!(f, "redirect: {redirect_url}"),
            HookResult::ShowError { error_message, .. } => {
                write!(f, "show_error: {error_message}")
            }
            HookResult::Deny { error, description } => write!(f, "deny: {error} {description}"),
            other => f.write_str(other.label()),
        }
    }
}
