//! 外部 HTTP 调用的错误映射与响应解析

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use idp_hooks_core::{ErrorBuilder, ErrorCode, HookError, Result};

/// 传输层错误：超时单独归类，其余视为服务不可用
pub fn transport_error(service: &str, err: reqwest::Error) -> HookError {
    let code = if err.is_timeout() {
        ErrorCode::OperationTimeout
    } else if err.is_decode() {
        ErrorCode::DeserializationError
    } else {
        ErrorCode::ServiceUnavailable
    };
    ErrorBuilder::new(code, &format!("{service} request failed"))
        .details(err.to_string())
        .build_error()
}

/// 非成功状态码映射
pub fn status_error(service: &str, status: StatusCode, body: &str) -> HookError {
    let code = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorCode::AuthenticationFailed,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorCode::OperationTimeout,
        _ => ErrorCode::ServiceUnavailable,
    };
    ErrorBuilder::new(code, &format!("{service} returned status {}", status.as_u16()))
        .details(truncate(body, 512))
        .build_error()
}

/// 检查状态码，失败时读取响应体作为错误详情
pub async fn ensure_success(service: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(service, status, &body))
}

/// 读取并解析 JSON 响应
pub async fn read_json<T: DeserializeOwned>(service: &str, response: Response) -> Result<T> {
    let response = ensure_success(service, response).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|err| transport_error(service, err))?;
    decode_json(service, &bytes)
}

pub fn decode_json<T: DeserializeOwned>(service: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|err| {
        ErrorBuilder::new(
            ErrorCode::DeserializationError,
            &format!("unexpected {service} response"),
        )
        .details(err.to_string())
        .build_error()
    })
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
