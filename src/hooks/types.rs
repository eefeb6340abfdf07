use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::context::InvocationContext;
use super::outcome::HookResult;

/// Hook 类型（宿主平台调用的时机）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    PreRegistration,
    PostIdentification,
    PostAccountLogin,
}

impl HookKind {
    /// 阻塞型 Hook：平台等待结果后再继续登录/注册事务
    pub fn is_blocking(self) -> bool {
        !matches!(self, HookKind::PostAccountLogin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HookKind::PreRegistration => "pre_registration",
            HookKind::PostIdentification => "post_identification",
            HookKind::PostAccountLogin => "post_account_login",
        }
    }
}

/// 外部服务不可用时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 失败即拒绝（默认）
    #[default]
    FailClosed,
    /// 失败即放行
    FailOpen,
}

/// Hook 注册元信息
#[derive(Debug, Clone)]
pub struct HookMetadata {
    pub name: Arc<str>,
    pub description: Option<Arc<str>>,
    pub kind: HookKind,
    pub timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for HookMetadata {
    fn default() -> Self {
        Self {
            name: Arc::from("anonymous"),
            description: None,
            kind: HookKind::PreRegistration,
            timeout: Duration::from_millis(3_000),
            failure_policy: FailurePolicy::FailClosed,
        }
    }
}

impl HookMetadata {
    pub fn with_kind(mut self, kind: HookKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_name<T: Into<Arc<str>>>(mut self, name: T) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description<T: Into<Arc<str>>>(mut self, description: Option<T>) -> Self {
        self.description = description.map(Into::into);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// Hook 契约
///
/// 每个集成只调用一个外部服务，并把响应映射为 [`HookResult`]。
/// 返回的错误由 [`HookPlan`](super::HookPlan) 按错误类别与失败策略转换为结果，
/// 实现方不需要自己处理降级。
#[async_trait]
pub trait Hook: Send + Sync {
    async fn invoke(&self, ctx: &InvocationContext) -> Result<HookResult>;

    /// 是否允许在外部服务失败时放行
    fn supports_fail_open(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T> Hook for Arc<T>
where
    T: Hook + ?Sized,
{
    async fn invoke(&self, ctx: &InvocationContext) -> Result<HookResult> {
        (**self).invoke(ctx).await
    }

    fn supports_fail_open(&self) -> bool {
        (**self).supports_fail_open()
    }
}
