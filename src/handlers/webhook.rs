use crate::models::WebhookPayload;
use crate::services::PaymentService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use log::{error, info};
use serde_json::json;

/// Konnect webhook endpoint.
///
/// The gateway pushes a final payment status here; this is the source of
/// truth for settling hosted-page donations. The payload is parsed strictly,
/// so a request with unknown fields is rejected with 400 before it reaches
/// reconciliation. A failed reconciliation answers with its mapped error
/// status so the gateway redelivers later.
pub async fn konnect_webhook(
    payment_service: web::Data<PaymentService>,
    payload: web::Json<WebhookPayload>,
) -> Result<HttpResponse> {
    let payload = payload.into_inner();
    info!(
        "Received Konnect webhook for {} with status {}",
        payload.payment_ref, payload.status
    );

    match payment_service.handle_webhook(&payload).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "received": true
        }))),
        Err(e) => {
            error!("Failed to process webhook for {}: {e}", payload.payment_ref);
            Ok(e.error_response())
        }
    }
}

pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhook").route("/konnect", web::post().to(konnect_webhook)));
}
