use std::sync::Arc;

use super::context::InvocationContext;
use super::outcome::HookResult;
use super::registry::HookRegistry;

/// 调度结果
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// 阻塞型 Hook 的执行结果
    Completed(HookResult),
    /// 非阻塞型 Hook 已提交后台执行，结果会被丢弃
    Accepted,
    /// 未注册的 Hook
    UnknownHook,
}

/// Hook 调度器，封装常用执行入口
#[derive(Clone)]
pub struct HookDispatcher {
    registry: Arc<HookRegistry>,
}

impl HookDispatcher {
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    pub async fn dispatch(&self, name: &str, ctx: InvocationContext) -> Dispatch {
        let Some(plan) = self.registry.plan(name).await else {
            tracing::warn!(hook = %name, "hook not registered");
            return Dispatch::UnknownHook;
        };

        if plan.kind().is_blocking() {
            return Dispatch::Completed(plan.execute(&ctx).await);
        }

        // 平台不等待非阻塞 Hook，失败只记录日志
        tokio::spawn(async move {
            let result = plan.execute(&ctx).await;
            if !result.is_success() {
                tracing::warn!(
                    hook = %plan.name(),
                    outcome = %result,
                    "non-blocking hook did not complete cleanly"
                );
            }
        });
        Dispatch::Accepted
    }
}
