//! 调用签名：`X-Hook-Signature: sha256=<hex(HMAC-SHA256(secret, body))>`

use axum::Json;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use super::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hook-signature";
const SIGNATURE_PREFIX: &str = "sha256=";
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// 生成请求体签名
pub fn sign(secret: &str, payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// 常量时间比较
fn verify(secret: &str, payload: &[u8], header: &str) -> bool {
    let Some(signature) = header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

fn unauthorized(reason: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "invalid_signature", "description": reason })),
    )
        .into_response()
}

pub async fn verify_signature(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(secret) = state.signing_secret.clone() else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let Some(header) = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
    else {
        tracing::warn!(uri = %parts.uri, "missing hook signature");
        return unauthorized("missing signature");
    };

    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": "invalid_request", "description": err.to_string() })),
            )
                .into_response();
        }
    };

    if !verify(&secret, &bytes, &header) {
        tracing::warn!(uri = %parts.uri, "hook signature mismatch");
        return unauthorized("signature mismatch");
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
