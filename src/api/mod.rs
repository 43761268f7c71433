//! HTTP 层：中间件与路由

pub mod middleware;
pub mod services;

use std::sync::Arc;

use actix_web::web;

use crate::config::StaticConfig;
use crate::services::DispatchService;
use middleware::{ApiAuth, CallbackAuth};
use services::relay::{ApiGovernorConfig, json_config};
use services::{AppStartTime, api_v1_routes, callback_routes, health_routes};

/// 注册全部路由，server 与集成测试共用
pub fn configure_app(
    cfg: &mut web::ServiceConfig,
    config: &StaticConfig,
    dispatch: Arc<DispatchService>,
    start_time: AppStartTime,
    governor: &ApiGovernorConfig,
) {
    cfg.app_data(web::Data::new(dispatch))
        .app_data(web::Data::new(start_time))
        .app_data(json_config(config.api.max_body_bytes))
        .service(
            web::scope("/api")
                .wrap(ApiAuth::new(&config.api.token))
                .wrap(actix_governor::Governor::new(governor))
                .service(api_v1_routes()),
        )
        .service(
            web::scope("/callbacks")
                .wrap(CallbackAuth::new(&config.callbacks.token))
                .service(callback_routes()),
        )
        .service(web::scope("/health").service(health_routes()));
}

pub use middleware::RequestIdMiddleware;
