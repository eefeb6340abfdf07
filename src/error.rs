//! IdP Hooks 错误工具模块
//!
//! - 统一定义 Hook 执行过程中的错误码与错误类型
//! - 提供 `ErrorBuilder` 便捷构造错误，并按类别映射到 Hook 结果

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T, E = HookError> = std::result::Result<T, E>;

/// 错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// 缺少必需的凭据或配置项
    ConfigurationError,
    /// 调用上下文缺少必需字段（如主邮箱）
    InvalidContext,
    /// 外部服务不可达或返回非成功状态
    ServiceUnavailable,
    /// 外部调用超时
    OperationTimeout,
    /// 向外部服务认证失败
    AuthenticationFailed,
    /// 外部服务响应格式不符合预期
    DeserializationError,
    /// 外部服务明确返回"未找到"
    NotFound,
    /// 签名或策略校验失败
    VerificationFailed,
}

/// 错误类别，决定错误如何映射为 Hook 结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Collaborator,
    NoMatch,
    Verification,
}

impl ErrorCode {
    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorCode::ConfigurationError | ErrorCode::InvalidContext => {
                ErrorCategory::Configuration
            }
            ErrorCode::ServiceUnavailable
            | ErrorCode::OperationTimeout
            | ErrorCode::AuthenticationFailed
            | ErrorCode::DeserializationError => ErrorCategory::Collaborator,
            ErrorCode::NotFound => ErrorCategory::NoMatch,
            ErrorCode::VerificationFailed => ErrorCategory::Verification,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ConfigurationError => "configuration_error",
            ErrorCode::InvalidContext => "invalid_context",
            ErrorCode::ServiceUnavailable => "service_unavailable",
            ErrorCode::OperationTimeout => "operation_timeout",
            ErrorCode::AuthenticationFailed => "authentication_failed",
            ErrorCode::DeserializationError => "deserialization_error",
            ErrorCode::NotFound => "not_found",
            ErrorCode::VerificationFailed => "verification_failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hook 错误
///
/// `message` 面向调用方（`NotFound` 时直接展示给终端用户），
/// `details` 只用于日志，不会出现在 Hook 结果中。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct HookError {
    code: ErrorCode,
    message: String,
    details: Option<String>,
}

impl HookError {
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

/// 错误构造器
pub struct ErrorBuilder {
    code: ErrorCode,
    message: String,
    details: Option<String>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn details<T: Into<String>>(mut self, details: T) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn build_error(self) -> HookError {
        HookError {
            code: self.code,
            message: self.message,
            details: self.details,
        }
    }
}

/// 便捷宏：构造错误并提前返回
#[macro_export]
macro_rules! bail_hook {
    ($code:expr, $msg:expr) => {
        return Err($crate::error::ErrorBuilder::new($code, $msg).build_error())
    };
    ($code:expr, $msg:expr, $details:expr) => {
        return Err($crate::error::ErrorBuilder::new($code, $msg)
            .details($details)
            .build_error())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ErrorCode::ConfigurationError.category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            ErrorCode::InvalidContext.category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            ErrorCode::OperationTimeout.category(),
            ErrorCategory::Collaborator
        );
        assert_eq!(
            ErrorCode::DeserializationError.category(),
            ErrorCategory::Collaborator
        );
        assert_eq!(ErrorCode::NotFound.category(), ErrorCategory::NoMatch);
        assert_eq!(
            ErrorCode::VerificationFailed.category(),
            ErrorCategory::Verification
        );
    }

    #[test]
    fn test_error_builder() {
        let err = ErrorBuilder::new(ErrorCode::ServiceUnavailable, "crm unreachable")
            .details("status=503")
            .build_error();
        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
        assert_eq!(err.message(), "crm unreachable");
        assert_eq!(err.details(), Some("status=503"));
        assert_eq!(err.to_string(), "service_unavailable: crm unreachable");
    }

    fn bails() -> Result<()> {
        bail_hook!(ErrorCode::NotFound, "nothing here", "id=1");
    }

    #[test]
    fn test_bail_macro() {
        let err = bails().unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.details(), Some("id=1"));
    }
}
