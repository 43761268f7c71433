//! 发送相关接口

use std::sync::Arc;

use actix_web::{Responder, Result as ActixResult, web};
use tracing::trace;

use crate::services::DispatchService;

use super::helpers::{api_result, dispatch_error, success_response};
use super::types::{PlaceCallBody, SendMmsBody, SendResponse, SendSmsBody};

/// POST /messages/sms
pub async fn send_sms(
    dispatch: web::Data<Arc<DispatchService>>,
    body: web::Json<SendSmsBody>,
) -> ActixResult<impl Responder> {
    match dispatch.send_sms(body.into_inner().into()).await {
        Ok(result) => Ok(success_response(SendResponse::from(result))),
        Err(e) => Ok(dispatch_error(&e, &dispatch)),
    }
}

/// POST /messages/mms
pub async fn send_mms(
    dispatch: web::Data<Arc<DispatchService>>,
    body: web::Json<SendMmsBody>,
) -> ActixResult<impl Responder> {
    match dispatch.send_mms(body.into_inner().into()).await {
        Ok(result) => Ok(success_response(SendResponse::from(result))),
        Err(e) => Ok(dispatch_error(&e, &dispatch)),
    }
}

/// POST /calls
pub async fn place_call(
    dispatch: web::Data<Arc<DispatchService>>,
    body: web::Json<PlaceCallBody>,
) -> ActixResult<impl Responder> {
    match dispatch.place_call(body.into_inner().into()).await {
        Ok(result) => Ok(success_response(SendResponse::from(result))),
        Err(e) => Ok(dispatch_error(&e, &dispatch)),
    }
}

/// GET /messages/{sid}
pub async fn get_message_status(
    dispatch: web::Data<Arc<DispatchService>>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let sid = path.into_inner();
    trace!("Delivery status requested for {}", sid);
    Ok(api_result(dispatch.message_status(&sid)))
}

/// GET /quota
pub async fn get_quota(dispatch: web::Data<Arc<DispatchService>>) -> ActixResult<impl Responder> {
    Ok(success_response(dispatch.quota_snapshot()))
}
