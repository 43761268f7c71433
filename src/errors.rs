use std::fmt;

use actix_web::http::StatusCode;

use crate::utils::phone::PhoneValidationError;

#[derive(Debug, Clone)]
pub enum RelayError {
    Validation(String),
    InvalidPhone(String),
    NotFound(String),
    ConsentRequired(String),
    QuotaExceeded(String),
    Provider(String),
    ProviderConfig(String),
    Unauthorized(String),
    FileOperation(String),
    Serialization(String),
    Config(String),
}

impl RelayError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => "E001",
            RelayError::InvalidPhone(_) => "E002",
            RelayError::NotFound(_) => "E003",
            RelayError::ConsentRequired(_) => "E004",
            RelayError::QuotaExceeded(_) => "E005",
            RelayError::Provider(_) => "E006",
            RelayError::ProviderConfig(_) => "E007",
            RelayError::Unauthorized(_) => "E008",
            RelayError::FileOperation(_) => "E009",
            RelayError::Serialization(_) => "E010",
            RelayError::Config(_) => "E011",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => "Validation Error",
            RelayError::InvalidPhone(_) => "Invalid Phone Number",
            RelayError::NotFound(_) => "Resource Not Found",
            RelayError::ConsentRequired(_) => "Consent Required",
            RelayError::QuotaExceeded(_) => "Send Quota Exceeded",
            RelayError::Provider(_) => "Provider Error",
            RelayError::ProviderConfig(_) => "Provider Configuration Error",
            RelayError::Unauthorized(_) => "Unauthorized",
            RelayError::FileOperation(_) => "File Operation Error",
            RelayError::Serialization(_) => "Serialization Error",
            RelayError::Config(_) => "Configuration Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            RelayError::Validation(msg)
            | RelayError::InvalidPhone(msg)
            | RelayError::NotFound(msg)
            | RelayError::ConsentRequired(msg)
            | RelayError::QuotaExceeded(msg)
            | RelayError::Provider(msg)
            | RelayError::ProviderConfig(msg)
            | RelayError::Unauthorized(msg)
            | RelayError::FileOperation(msg)
            | RelayError::Serialization(msg)
            | RelayError::Config(msg) => msg,
        }
    }

    /// 映射到 HTTP 状态码
    pub fn http_status(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) | RelayError::InvalidPhone(_) => StatusCode::BAD_REQUEST,
            RelayError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayError::ConsentRequired(_) => StatusCode::FORBIDDEN,
            RelayError::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            RelayError::Provider(_) => StatusCode::BAD_GATEWAY,
            RelayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RelayError::ProviderConfig(_)
            | RelayError::FileOperation(_)
            | RelayError::Serialization(_)
            | RelayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 格式化为彩色输出（用于 Server 模式）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于 CLI 模式）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for RelayError {}

// 便捷的构造函数
impl RelayError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        RelayError::Validation(msg.into())
    }

    pub fn invalid_phone<T: Into<String>>(msg: T) -> Self {
        RelayError::InvalidPhone(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        RelayError::NotFound(msg.into())
    }

    pub fn consent_required<T: Into<String>>(msg: T) -> Self {
        RelayError::ConsentRequired(msg.into())
    }

    pub fn quota_exceeded<T: Into<String>>(msg: T) -> Self {
        RelayError::QuotaExceeded(msg.into())
    }

    pub fn provider<T: Into<String>>(msg: T) -> Self {
        RelayError::Provider(msg.into())
    }

    pub fn provider_config<T: Into<String>>(msg: T) -> Self {
        RelayError::ProviderConfig(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        RelayError::Unauthorized(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        RelayError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        RelayError::Serialization(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        RelayError::Config(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err.to_string())
    }
}

impl From<PhoneValidationError> for RelayError {
    fn from(err: PhoneValidationError) -> Self {
        RelayError::InvalidPhone(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
