//! 运营商回调
//!
//! - POST /callbacks/status  投递状态回调
//! - POST /callbacks/inbound 入站短信，回复 TwiML

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Responder, Result as ActixResult, web};
use serde::Serialize;
use tracing::{debug, info};

use crate::services::provider::render_message_twiml;
use crate::services::{ApplyOutcome, DeliveryStatus, DispatchService};

use super::relay::ErrorCode;
use super::relay::helpers::{error_from_relay, error_response, success_response};
use super::relay::types::{InboundMessageForm, StatusCallbackForm};

pub const CALLBACK_TOKEN_HEADER: &str = "X-Callback-Token";

#[derive(Debug, Serialize)]
struct StatusCallbackAck {
    sid: String,
    status: DeliveryStatus,
    outcome: ApplyOutcome,
}

pub struct CallbackService;

impl CallbackService {
    pub async fn status_callback(
        dispatch: web::Data<Arc<DispatchService>>,
        form: web::Form<StatusCallbackForm>,
    ) -> ActixResult<impl Responder> {
        let form = form.into_inner();
        let (Some(sid), Some(status)) = (form.sid(), form.status()) else {
            return Ok(error_response(
                StatusCode::BAD_REQUEST,
                ErrorCode::BadRequest,
                "Callback requires a message or call SID and a status",
            ));
        };

        match dispatch.handle_status_callback(
            sid,
            status,
            form.error_code.as_deref(),
            form.to.as_deref(),
        ) {
            Ok((record, outcome)) => Ok(success_response(StatusCallbackAck {
                sid: record.sid,
                status: record.status,
                outcome,
            })),
            Err(e) => Ok(error_from_relay(&e)),
        }
    }

    pub async fn inbound_message(
        dispatch: web::Data<Arc<DispatchService>>,
        form: web::Form<InboundMessageForm>,
    ) -> ActixResult<impl Responder> {
        let form = form.into_inner();
        debug!(
            "Inbound message {}",
            form.message_sid.as_deref().unwrap_or("-")
        );

        let outcome = match dispatch.handle_inbound(&form.from, &form.body) {
            Ok(outcome) => outcome,
            Err(e) => return Ok(error_from_relay(&e)),
        };

        if let Some(action) = outcome.action {
            info!("Inbound keyword {:?} from {}", action, outcome.from.masked());
        }

        Ok(HttpResponse::Ok()
            .content_type("text/xml; charset=utf-8")
            .body(render_message_twiml(outcome.reply.as_deref())))
    }
}

/// Callback 路由配置
pub fn callback_routes() -> actix_web::Scope {
    web::scope("")
        .route("/status", web::post().to(CallbackService::status_callback))
        .route("/inbound", web::post().to(CallbackService::inbound_message))
}
