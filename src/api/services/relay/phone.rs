//! 号码校验接口

use std::sync::Arc;

use actix_web::{Responder, Result as ActixResult, web};

use crate::services::DispatchService;

use super::helpers::api_result;
use super::types::ValidatePhoneBody;

/// POST /phone/validate
///
/// 格式错误时仍返回 200，`valid` 为 false；只有运营商查询失败才返回错误。
pub async fn validate_phone(
    dispatch: web::Data<Arc<DispatchService>>,
    body: web::Json<ValidatePhoneBody>,
) -> ActixResult<impl Responder> {
    let body = body.into_inner();
    Ok(api_result(
        dispatch.validate_phone(&body.phone, body.lookup).await,
    ))
}
