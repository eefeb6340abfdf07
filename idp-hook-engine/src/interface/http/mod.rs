//! # HTTP 调用入口
//!
//! - `POST /v1/hooks/:name`：平台调用指定 Hook
//! - `GET /health`：健康检查

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use idp_hooks_core::HookDispatcher;

pub mod handlers;
pub mod signature;

pub use signature::{SIGNATURE_HEADER, sign};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: HookDispatcher,
    /// 配置后所有调用都必须携带有效签名
    pub signing_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(dispatcher: HookDispatcher) -> Self {
        Self {
            dispatcher,
            signing_secret: None,
        }
    }

    pub fn with_signing_secret<S: Into<Arc<str>>>(mut self, secret: Option<S>) -> Self {
        self.signing_secret = secret.map(Into::into);
        self
    }
}

pub fn router(state: AppState) -> Router {
    let hooks = Router::new()
        .route("/v1/hooks/:name", post(handlers::invoke_hook))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            signature::verify_signature,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(hooks)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
