use crate::models::*;
use crate::services::PaymentService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/payments/{payment_ref}",
    tag = "payments",
    params(
        ("payment_ref" = String, Path, description = "Gateway payment reference")
    ),
    responses(
        (status = 200, description = "Current gateway status", body = GatewayStatusResponse),
        (status = 404, description = "Reference unknown to the gateway"),
        (status = 502, description = "Payment gateway unavailable")
    )
)]
pub async fn gateway_status(
    payment_service: web::Data<PaymentService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    match payment_service.get_gateway_status(&path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/payments/{payment_ref}/verify",
    tag = "payments",
    params(
        ("payment_ref" = String, Path, description = "Gateway payment reference"),
        ("campaign" = Option<i64>, Query, description = "Campaign id hint from the redirect URL"),
        ("amount" = Option<i64>, Query, description = "Amount hint in millimes from the redirect URL")
    ),
    responses(
        (status = 200, description = "Verification view for the landing page", body = VerificationView),
        (status = 404, description = "Reference unknown to the gateway")
    )
)]
pub async fn verify_payment(
    payment_service: web::Data<PaymentService>,
    path: web::Path<String>,
    query: web::Query<VerifyQuery>,
) -> Result<HttpResponse> {
    match payment_service
        .verify_payment(&path.into_inner(), &query.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn payment_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payments")
            .route("/{payment_ref}", web::get().to(gateway_status))
            .route("/{payment_ref}/verify", web::get().to(verify_payment)),
    );
}
