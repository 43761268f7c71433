use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use crate::api::services::relay::{ApiResponse, ErrorCode};
use crate::services::{DispatchService, QuotaSnapshot};
use crate::utils::format_duration_human;

// 应用启动时间结构体
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub provider: String,
    pub consent_records: usize,
    pub quota: QuotaSnapshot,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub uptime: u64,
    pub uptime_human: String,
    pub checks: HealthChecks,
    pub response_time_ms: u32,
}

/// Health Service
///
/// 所有状态都在内存中，检查本身不会阻塞
pub struct HealthService;

impl HealthService {
    pub async fn health_check(
        dispatch: web::Data<Arc<DispatchService>>,
        app_start_time: web::Data<AppStartTime>,
    ) -> impl Responder {
        let start_time = Instant::now();
        trace!("Received health check request");

        let now = chrono::Utc::now();
        let uptime_human = format_duration_human(app_start_time.start_datetime, now);
        let uptime_seconds = (now - app_start_time.start_datetime).num_seconds().max(0) as u64;

        let health_data = HealthResponse {
            status: "healthy".to_string(),
            timestamp: now.to_rfc3339(),
            uptime: uptime_seconds,
            uptime_human,
            checks: HealthChecks {
                provider: dispatch.provider_name().to_string(),
                consent_records: dispatch.consent_registry().len(),
                quota: dispatch.quota_snapshot(),
            },
            response_time_ms: start_time.elapsed().as_millis() as u32,
        };

        debug!(
            "Health check completed in {:?}, uptime: {}",
            start_time.elapsed(),
            health_data.uptime_human
        );

        HttpResponse::Ok()
            .append_header(("Content-Type", "application/json; charset=utf-8"))
            .json(ApiResponse {
                code: ErrorCode::Success as i32,
                message: "OK".to_string(),
                data: Some(health_data),
            })
    }

    // 简单的就绪检查，只返回 200 状态码
    pub async fn readiness_check() -> impl Responder {
        trace!("Received readiness check request");

        HttpResponse::Ok()
            .append_header(("Content-Type", "text/plain"))
            .body("OK")
    }

    // 活跃性检查
    pub async fn liveness_check() -> impl Responder {
        trace!("Received liveness check request");

        HttpResponse::NoContent().finish()
    }
}

/// Health 路由配置
pub fn health_routes() -> actix_web::Scope {
    web::scope("")
        .route("", web::get().to(HealthService::health_check))
        .route("", web::head().to(HealthService::health_check))
        .route("/ready", web::get().to(HealthService::readiness_check))
        .route("/ready", web::head().to(HealthService::readiness_check))
        .route("/live", web::get().to(HealthService::liveness_check))
        .route("/live", web::head().to(HealthService::liveness_check))
}
