//! API 帮助函数

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use actix_web::http::header::{HeaderValue, RETRY_AFTER};
use serde::Serialize;
use tracing::{debug, error};

use crate::errors::RelayError;
use crate::services::DispatchService;

use super::error_code::ErrorCode;
use super::types::ApiResponse;

/// 构建 JSON 响应
pub fn json_response<T: Serialize>(
    status: StatusCode,
    code: ErrorCode,
    message: impl Into<String>,
    data: Option<T>,
) -> HttpResponse {
    HttpResponse::build(status)
        .append_header(("Content-Type", "application/json; charset=utf-8"))
        .json(ApiResponse {
            code: code as i32,
            message: message.into(),
            data,
        })
}

/// 构建成功响应
pub fn success_response<T: Serialize>(data: T) -> HttpResponse {
    json_response(StatusCode::OK, ErrorCode::Success, "OK", Some(data))
}

/// 构建错误响应
pub fn error_response(status: StatusCode, error_code: ErrorCode, message: &str) -> HttpResponse {
    json_response::<()>(status, error_code, message, None)
}

/// 从 RelayError 构建错误响应（自动映射 HTTP 状态码和 ErrorCode）
pub fn error_from_relay(err: &RelayError) -> HttpResponse {
    let status = err.http_status();
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        debug!("Request rejected: {}", err);
    }
    error_response(status, ErrorCode::from(err), err.message())
}

/// 发送类接口的错误响应，配额超限时附带 Retry-After
pub fn dispatch_error(err: &RelayError, dispatch: &DispatchService) -> HttpResponse {
    let mut response = error_from_relay(err);
    if let RelayError::QuotaExceeded(_) = err {
        response.headers_mut().insert(
            RETRY_AFTER,
            HeaderValue::from(dispatch.retry_after_secs()),
        );
    }
    response
}

/// 统一 Result → HttpResponse 转换
///
/// 成功时返回 200 OK + JSON 数据，失败时自动映射 RelayError。
pub fn api_result<T, E>(result: Result<T, E>) -> HttpResponse
where
    T: Serialize,
    E: Into<RelayError>,
{
    match result {
        Ok(data) => success_response(data),
        Err(e) => {
            let err: RelayError = e.into();
            error_from_relay(&err)
        }
    }
}
