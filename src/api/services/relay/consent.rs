//! 授权管理接口

use std::sync::Arc;

use actix_web::{Responder, Result as ActixResult, web};

use crate::services::DispatchService;

use super::helpers::{api_result, success_response};
use super::types::UpdateConsentBody;

/// GET /consent
pub async fn list_consent(
    dispatch: web::Data<Arc<DispatchService>>,
) -> ActixResult<impl Responder> {
    Ok(success_response(dispatch.list_consent()))
}

/// GET /consent/{phone}
pub async fn get_consent(
    dispatch: web::Data<Arc<DispatchService>>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    Ok(api_result(dispatch.check_consent(&path.into_inner())))
}

/// PUT /consent/{phone}
pub async fn update_consent(
    dispatch: web::Data<Arc<DispatchService>>,
    path: web::Path<String>,
    body: web::Json<UpdateConsentBody>,
) -> ActixResult<impl Responder> {
    Ok(api_result(
        dispatch.update_consent(&path.into_inner(), body.status),
    ))
}
