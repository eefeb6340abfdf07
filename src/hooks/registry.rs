use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{ErrorBuilder, ErrorCategory, ErrorCode, HookError};

use super::context::InvocationContext;
use super::outcome::HookResult;
use super::types::{FailurePolicy, Hook, HookKind, HookMetadata};

/// 校验失败时返回给平台的统一描述，不泄露内部细节
const VERIFICATION_FAILED_DESCRIPTION: &str = "Failed validation";

/// Hook 执行计划
#[derive(Clone)]
pub struct HookPlan {
    metadata: HookMetadata,
    handler: Arc<dyn Hook>,
}

impl std::fmt::Debug for HookPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookPlan")
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl HookPlan {
    pub fn new(metadata: HookMetadata, handler: Arc<dyn Hook>) -> Self {
        let mut metadata = metadata;
        if metadata.failure_policy == FailurePolicy::FailOpen && !handler.supports_fail_open() {
            tracing::warn!(
                hook = %metadata.name,
                "hook does not support fail-open, falling back to fail-closed"
            );
            metadata.failure_policy = FailurePolicy::FailClosed;
        }
        Self { metadata, handler }
    }

    pub fn metadata(&self) -> &HookMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn kind(&self) -> HookKind {
        self.metadata.kind
    }

    /// 执行 Hook，任何错误或超时都会被转换为结果
    pub async fn execute(&self, ctx: &InvocationContext) -> HookResult {
        let fut = self.handler.invoke(ctx);
        let result = match tokio::time::timeout(self.metadata.timeout, fut).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => self.resolve_error(err, ctx),
            Err(_) => {
                let err = ErrorBuilder::new(ErrorCode::OperationTimeout, "hook timed out")
                    .details(format!(
                        "hook={}, timeout_ms={}",
                        self.metadata.name,
                        self.metadata.timeout.as_millis()
                    ))
                    .build_error();
                self.resolve_error(err, ctx)
            }
        };

        tracing::info!(
            hook = %self.metadata.name,
            kind = self.metadata.kind.as_str(),
            outcome = result.label(),
            "hook executed"
        );
        result
    }

    fn resolve_error(&self, err: HookError, ctx: &InvocationContext) -> HookResult {
        let name = &self.metadata.name;
        match err.category() {
            ErrorCategory::Configuration => {
                tracing::error!(
                    hook = %name,
                    code = %err.code(),
                    details = err.details().unwrap_or_default(),
                    "hook misconfigured: {}",
                    err.message()
                );
                HookResult::deny(err.code().as_str(), err.message())
            }
            ErrorCategory::Collaborator => match self.metadata.failure_policy {
                FailurePolicy::FailOpen => {
                    tracing::warn!(
                        hook = %name,
                        code = %err.code(),
                        details = err.details().unwrap_or_default(),
                        "collaborator failed, fail-open policy lets the flow proceed: {}",
                        err.message()
                    );
                    HookResult::pass_through(self.metadata.kind, ctx)
                }
                FailurePolicy::FailClosed => {
                    tracing::warn!(
                        hook = %name,
                        code = %err.code(),
                        details = err.details().unwrap_or_default(),
                        "collaborator failed, denying: {}",
                        err.message()
                    );
                    HookResult::deny(err.code().as_str(), err.message())
                }
            },
            ErrorCategory::NoMatch => {
                tracing::info!(
                    hook = %name,
                    details = err.details().unwrap_or_default(),
                    "collaborator found no match"
                );
                HookResult::show_error(err.message(), ctx.session.clone())
            }
            ErrorCategory::Verification => {
                tracing::warn!(
                    hook = %name,
                    details = err.details().unwrap_or_default(),
                    "verification failed: {}",
                    err.message()
                );
                HookResult::deny(err.code().as_str(), VERIFICATION_FAILED_DESCRIPTION)
            }
        }
    }
}

/// Hook 注册中心
#[derive(Default)]
pub struct HookRegistry {
    plans: RwLock<HashMap<String, HookPlan>>,
}

impl HookRegistry {
    pub fn builder() -> HookRegistryBuilder {
        HookRegistryBuilder::new()
    }

    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 注册 Hook，同名 Hook 会被替换
    pub async fn register(&self, metadata: HookMetadata, handler: Arc<dyn Hook>) {
        let plan = HookPlan::new(metadata, handler);
        let name = plan.name().to_string();
        let mut guard = self.plans.write().await;
        if guard.insert(name.clone(), plan).is_some() {
            tracing::warn!(hook = %name, "hook replaced in registry");
        }
    }

    pub async fn plan(&self, name: &str) -> Option<HookPlan> {
        self.plans.read().await.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.plans.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.plans.read().await.is_empty()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plans.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[derive(Default)]
pub struct HookRegistryBuilder {
    registry: Option<Arc<HookRegistry>>,
}

impl HookRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, registry: Arc<HookRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Arc<HookRegistry> {
        self.registry.unwrap_or_else(HookRegistry::new)
    }
}
