use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use idp_hooks_core::{Dispatch, InvocationContext};

use super::AppState;

pub async fn invoke_hook(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<InvocationContext>, JsonRejection>,
) -> Response {
    let Json(ctx) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!(hook = %name, error = %rejection, "malformed invocation context");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_request", "description": rejection.body_text() })),
            )
                .into_response();
        }
    };

    let span = tracing::info_span!("invoke", hook = %name, invocation_id = %Uuid::new_v4());
    let dispatch = state.dispatcher.dispatch(&name, ctx).instrument(span).await;

    match dispatch {
        Dispatch::Completed(result) => {
            tracing::info!(hook = %name, outcome = result.label(), "hook completed");
            (StatusCode::OK, Json(result)).into_response()
        }
        Dispatch::Accepted => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "accepted" })),
        )
            .into_response(),
        Dispatch::UnknownHook => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "hook_not_found", "hook": name })),
        )
            .into_response(),
    }
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let hooks = state.dispatcher.registry().len().await;
    Json(json!({ "status": "ok", "hooks": hooks }))
}
