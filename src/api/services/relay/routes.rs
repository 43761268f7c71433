//! API 路由配置

use actix_governor::{GovernorConfig, GovernorConfigBuilder, KeyExtractor, SimpleKeyExtractionError};
use actix_web::dev::ServiceRequest;
use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::http::header::{HeaderValue, RETRY_AFTER};
use actix_web::{HttpResponse, HttpResponseBuilder, web};
use governor::NotUntil;
use governor::clock::{Clock, DefaultClock, QuantaInstant};
use governor::middleware::NoOpMiddleware;
use tracing::debug;

use crate::config::ApiConfig;
use crate::errors::{RelayError, Result};

use super::consent::{get_consent, list_consent, update_consent};
use super::error_code::ErrorCode;
use super::helpers::error_response;
use super::messaging::{get_message_status, get_quota, place_call, send_mms, send_sms};
use super::phone::validate_phone;

/// 基于连接 IP 的限流 key 提取器
///
/// 只使用 TCP peer address，不信任 X-Forwarded-For。
#[derive(Clone, Copy)]
pub struct PeerKeyExtractor;

impl KeyExtractor for PeerKeyExtractor {
    type Key = String;
    type KeyExtractionError = SimpleKeyExtractionError<&'static str>;

    fn extract(&self, req: &ServiceRequest) -> std::result::Result<Self::Key, Self::KeyExtractionError> {
        // Unix socket 连接没有 peer address，共享同一个桶
        Ok(req
            .peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "local".to_string()))
    }

    /// 超限时返回与其他 API 错误一致的 JSON
    fn exceed_rate_limit_response(
        &self,
        negative: &NotUntil<QuantaInstant>,
        _response: HttpResponseBuilder,
    ) -> HttpResponse {
        let wait_secs = negative
            .wait_time_from(DefaultClock::default().now())
            .as_secs()
            .max(1);
        let mut response = error_response(
            StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::RateLimitExceeded,
            &format!("Too many requests, retry in {}s", wait_secs),
        );
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(wait_secs));
        response
    }
}

pub type ApiGovernorConfig = GovernorConfig<PeerKeyExtractor, NoOpMiddleware>;

/// 创建 API 限流配置
///
/// 所有 worker 共享同一个配置，限流状态才是全局的
pub fn api_governor_config(config: &ApiConfig) -> Result<ApiGovernorConfig> {
    if config.requests_per_second == 0 {
        return Err(RelayError::config("api.requests_per_second must be at least 1"));
    }

    let governor = GovernorConfigBuilder::default()
        .requests_per_second(config.requests_per_second)
        .burst_size(config.burst)
        .key_extractor(PeerKeyExtractor)
        .finish()
        .ok_or_else(|| {
            RelayError::config(format!(
                "Invalid rate limit: {} req/s, burst {}",
                config.requests_per_second, config.burst
            ))
        })?;

    debug!(
        "API rate limiter created: {} req/s, burst {}",
        config.requests_per_second, config.burst
    );
    Ok(governor)
}

/// JSON 请求体配置：限制大小，解析失败时返回统一格式
pub fn json_config(max_body_bytes: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(max_body_bytes)
        .error_handler(|err, _req| {
            let message = err.to_string();
            InternalError::from_response(
                err,
                error_response(StatusCode::BAD_REQUEST, ErrorCode::BadRequest, &message),
            )
            .into()
        })
}

/// 发送路由
///
/// 包含：
/// - POST /messages/sms
/// - POST /messages/mms
/// - GET /messages/{sid}
/// - POST /calls
pub fn messaging_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/messages/sms", web::post().to(send_sms))
        .route("/messages/mms", web::post().to(send_mms))
        .route("/messages/{sid}", web::get().to(get_message_status))
        .route("/calls", web::post().to(place_call));
}

/// 授权路由 `/consent`
pub fn consent_routes() -> actix_web::Scope {
    web::scope("/consent")
        .route("", web::get().to(list_consent))
        .route("/{phone}", web::get().to(get_consent))
        .route("/{phone}", web::put().to(update_consent))
}

/// API v1 路由
pub fn api_v1_routes() -> actix_web::Scope {
    web::scope("/v1")
        .configure(messaging_routes)
        .service(consent_routes())
        .route("/phone/validate", web::post().to(validate_phone))
        .route("/quota", web::get().to(get_quota))
}
