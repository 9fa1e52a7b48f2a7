use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;

use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;

fn unauthorized(req: ServiceRequest, message: &str) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::Unauthorized().json(json!({ "message": message }));
    req.into_response(resp.map_into_boxed_body())
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v,
            Err(_) => return Ok(unauthorized(req, "Invalid Authorization header encoding")),
        },
        None => return Ok(unauthorized(req, "Missing Authorization header")),
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return Ok(unauthorized(req, "Authorization header must start with Bearer")),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            return Ok(unauthorized(req, "Invalid or expired token"));
        }
    };

    req.extensions_mut().insert(AuthUser::from(claims));

    next.call(req).await
}
