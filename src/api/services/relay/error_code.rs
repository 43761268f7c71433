//! 统一 API 错误码定义

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::errors::RelayError;

/// API 错误码枚举
///
/// 使用 serde_repr 序列化为数字。按千位分域：
/// - 0: 成功
/// - 1000-1099: 通用错误
/// - 2000-2099: 号码错误
/// - 3000-3099: 发送错误
/// - 5000-5099: 配置错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum ErrorCode {
    // 成功
    Success = 0,

    // 通用错误 1000-1099
    BadRequest = 1000,
    Unauthorized = 1001,
    NotFound = 1004,
    InternalServerError = 1005,
    RateLimitExceeded = 1029,
    ServiceUnavailable = 1030,

    // 号码错误 2000-2099
    InvalidPhone = 2000,

    // 发送错误 3000-3099
    ConsentRequired = 3000,
    QuotaExceeded = 3001,
    ProviderError = 3002,
    ProviderNotConfigured = 3003,

    // 配置错误 5000-5099
    ConfigError = 5000,
}

impl From<&RelayError> for ErrorCode {
    fn from(err: &RelayError) -> Self {
        match err {
            RelayError::Validation(_) => ErrorCode::BadRequest,
            RelayError::InvalidPhone(_) => ErrorCode::InvalidPhone,
            RelayError::NotFound(_) => ErrorCode::NotFound,
            RelayError::ConsentRequired(_) => ErrorCode::ConsentRequired,
            RelayError::QuotaExceeded(_) => ErrorCode::QuotaExceeded,
            RelayError::Provider(_) => ErrorCode::ProviderError,
            RelayError::ProviderConfig(_) => ErrorCode::ProviderNotConfigured,
            RelayError::Unauthorized(_) => ErrorCode::Unauthorized,
            RelayError::FileOperation(_) | RelayError::Serialization(_) => {
                ErrorCode::InternalServerError
            }
            RelayError::Config(_) => ErrorCode::ConfigError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_number() {
        assert_eq!(serde_json::to_string(&ErrorCode::Success).unwrap(), "0");
        assert_eq!(
            serde_json::to_string(&ErrorCode::QuotaExceeded).unwrap(),
            "3001"
        );
    }

    #[test]
    fn test_from_relay_error() {
        assert_eq!(
            ErrorCode::from(&RelayError::consent_required("x")),
            ErrorCode::ConsentRequired
        );
        assert_eq!(
            ErrorCode::from(&RelayError::invalid_phone("x")),
            ErrorCode::InvalidPhone
        );
        assert_eq!(
            ErrorCode::from(&RelayError::serialization("x")),
            ErrorCode::InternalServerError
        );
    }
}
