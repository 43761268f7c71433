use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::CONTENT_TYPE,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, trace};

use crate::api::services::relay::{ApiResponse, ErrorCode};

/// 常量时间比较，避免通过响应耗时猜测 token
pub(crate) fn tokens_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// API Bearer token 认证中间件
///
/// token 为空时整个 API 关闭，所有请求返回 404。
#[derive(Clone)]
pub struct ApiAuth {
    token: Rc<str>,
}

impl ApiAuth {
    pub fn new(token: impl AsRef<str>) -> Self {
        Self {
            token: Rc::from(token.as_ref()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiAuthMiddleware {
            service: Rc::new(service),
            token: self.token.clone(),
        }))
    }
}

pub struct ApiAuthMiddleware<S> {
    service: Rc<S>,
    token: Rc<str>,
}

impl<S, B> ApiAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    /// Handle requests when API token is not configured
    fn handle_missing_token(req: ServiceRequest) -> ServiceResponse<EitherBody<B>> {
        debug!("API token not configured - returning 404");
        req.into_response(
            HttpResponse::NotFound()
                .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
                .body("Not Found")
                .map_into_right_body(),
        )
    }

    /// Handle unauthorized requests
    fn handle_unauthorized(req: ServiceRequest) -> ServiceResponse<EitherBody<B>> {
        info!("API authentication failed - invalid or missing token");
        req.into_response(
            HttpResponse::Unauthorized()
                .insert_header((CONTENT_TYPE, "application/json; charset=utf-8"))
                .insert_header(("WWW-Authenticate", "Bearer"))
                .json(ApiResponse::<()> {
                    code: ErrorCode::Unauthorized as i32,
                    message: "Unauthorized: Invalid or missing token".to_string(),
                    data: None,
                })
                .map_into_right_body(),
        )
    }

    /// 从 Authorization header 提取 Bearer token
    fn extract_bearer_token(req: &ServiceRequest) -> Option<&str> {
        req.headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(str::trim)
    }
}

impl<S, B> Service<ServiceRequest> for ApiAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let token = self.token.clone();

        Box::pin(async move {
            if token.is_empty() {
                return Ok(Self::handle_missing_token(req));
            }

            let authorized = Self::extract_bearer_token(&req)
                .is_some_and(|provided| tokens_match(provided, &token));
            if !authorized {
                return Ok(Self::handle_unauthorized(req));
            }

            trace!("API authentication successful");
            let response = srv.call(req).await?.map_into_left_body();
            Ok(response)
        })
    }
}
