use crate::middlewares::require_admin;
use crate::models::{DriftReport, TransactionQuery};
use crate::services::{CampaignService, PaymentService, UserService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/admin/drift",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Campaigns whose aggregates disagree with their transactions", body = DriftReport),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn drift_report(
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match payment_service.drift_report().await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/users/{id}/donations",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "Donor user id"),
        ("page" = Option<i64>, Query, description = "Page number"),
        ("page_size" = Option<i64>, Query, description = "Items per page")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Donation history of the given user"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn user_donations(
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<TransactionQuery>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match payment_service
        .get_user_donations(path.into_inner(), &query.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "User deleted with their campaigns and donations"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match user_service.delete_user(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "User deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/campaigns/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "Campaign id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Campaign and its transactions deleted"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Campaign not found")
    )
)]
pub async fn delete_campaign(
    campaign_service: web::Data<CampaignService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match campaign_service.delete_campaign(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Campaign deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/drift", web::get().to(drift_report))
            .route("/users/{id}/donations", web::get().to(user_donations))
            .route("/users/{id}", web::delete().to(delete_user))
            .route("/campaigns/{id}", web::delete().to(delete_campaign)),
    );
}
