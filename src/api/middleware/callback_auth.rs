//! 运营商回调鉴权
//!
//! 共享密钥可以放在 `X-Callback-Token` header 或 `token` 查询参数中；
//! 运营商只能回调固定 URL，所以查询参数是最常见的用法。

use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::CONTENT_TYPE,
    web,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use tracing::{trace, warn};

use super::auth::tokens_match;
use crate::api::services::callbacks::CALLBACK_TOKEN_HEADER;
use crate::api::services::relay::types::CallbackTokenQuery;

#[derive(Clone)]
pub struct CallbackAuth {
    token: Rc<str>,
}

impl CallbackAuth {
    /// token 为空时不做校验
    pub fn new(token: impl AsRef<str>) -> Self {
        Self {
            token: Rc::from(token.as_ref()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for CallbackAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = CallbackAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CallbackAuthMiddleware {
            service: Rc::new(service),
            token: self.token.clone(),
        }))
    }
}

pub struct CallbackAuthMiddleware<S> {
    service: Rc<S>,
    token: Rc<str>,
}

fn provided_token(req: &ServiceRequest) -> Option<String> {
    if let Some(value) = req
        .headers()
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
    {
        return Some(value.to_string());
    }

    web::Query::<CallbackTokenQuery>::from_query(req.query_string())
        .ok()
        .and_then(|q| q.into_inner().token)
}

impl<S, B> Service<ServiceRequest> for CallbackAuthMiddleware<S>
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
            if !token.is_empty() {
                let valid = provided_token(&req).is_some_and(|p| tokens_match(&p, &token));
                if !valid {
                    warn!("Rejected callback to {} - invalid or missing token", req.path());
                    return Ok(req.into_response(
                        HttpResponse::Forbidden()
                            .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
                            .body("Forbidden")
                            .map_into_right_body(),
                    ));
                }
            }

            trace!("Callback authenticated");
            let response = srv.call(req).await?.map_into_left_body();
            Ok(response)
        })
    }
}
