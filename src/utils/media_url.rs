//! 媒体 / 回调 URL 校验
//!
//! 提供给运营商的 URL 必须是公网可访问的 http(s) 地址

use url::Url;

/// URL 最大长度（运营商对 MediaUrl 的限制）
pub const MAX_URL_LENGTH: usize = 2048;

/// 拒绝的协议
const BLOCKED_SCHEMES: &[&str] = &["javascript", "data", "file", "vbscript", "about", "blob"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaUrlError {
    Empty,
    TooLong(usize),
    BlockedScheme(String),
    UnsupportedScheme(String),
    MissingHost,
    InvalidFormat(String),
}

impl std::fmt::Display for MediaUrlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "URL cannot be empty"),
            Self::TooLong(len) => write!(
                f,
                "URL is {} characters long, at most {} allowed",
                len, MAX_URL_LENGTH
            ),
            Self::BlockedScheme(s) => write!(f, "URL scheme '{}' is not allowed", s),
            Self::UnsupportedScheme(s) => write!(
                f,
                "Unsupported URL scheme '{}'. Only http:// and https:// are allowed",
                s
            ),
            Self::MissingHost => write!(f, "URL must contain a host"),
            Self::InvalidFormat(msg) => write!(f, "Invalid URL format: {}", msg),
        }
    }
}

impl std::error::Error for MediaUrlError {}

/// 校验 URL 并返回解析后的结果
pub fn validate_media_url(raw: &str) -> Result<Url, MediaUrlError> {
    let raw = raw.trim();

    if raw.is_empty() {
        return Err(MediaUrlError::Empty);
    }
    if raw.len() > MAX_URL_LENGTH {
        return Err(MediaUrlError::TooLong(raw.len()));
    }

    let url = Url::parse(raw).map_err(|e| MediaUrlError::InvalidFormat(e.to_string()))?;

    let scheme = url.scheme();
    if BLOCKED_SCHEMES.contains(&scheme) {
        return Err(MediaUrlError::BlockedScheme(scheme.to_string()));
    }
    if scheme != "http" && scheme != "https" {
        return Err(MediaUrlError::UnsupportedScheme(scheme.to_string()));
    }
    if url.host_str().is_none_or(|h| h.is_empty()) {
        return Err(MediaUrlError::MissingHost);
    }

    Ok(url)
}
