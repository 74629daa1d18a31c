use crate::middlewares::{current_user, maybe_current_user};
use crate::models::*;
use crate::services::{CampaignService, PaymentService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/campaigns",
    tag = "campaigns",
    params(
        ("category" = Option<String>, Query, description = "Filter by category"),
        ("page" = Option<i64>, Query, description = "Page number"),
        ("page_size" = Option<i64>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Campaign listing, newest first")
    )
)]
pub async fn list_campaigns(
    campaign_service: web::Data<CampaignService>,
    query: web::Query<CampaignQuery>,
) -> Result<HttpResponse> {
    match campaign_service.list_campaigns(&query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/campaigns",
    tag = "campaigns",
    request_body = CreateCampaignRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Campaign created", body = CampaignResponse),
        (status = 400, description = "Invalid campaign data"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_campaign(
    campaign_service: web::Data<CampaignService>,
    req: HttpRequest,
    request: web::Json<CreateCampaignRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match campaign_service
        .create_campaign(user.id, request.into_inner())
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
    get,
    path = "/campaigns/{id}",
    tag = "campaigns",
    params(
        ("id" = i64, Path, description = "Campaign id")
    ),
    responses(
        (status = 200, description = "Campaign detail with owner profile", body = CampaignDetailResponse),
        (status = 404, description = "Campaign not found")
    )
)]
pub async fn get_campaign(
    campaign_service: web::Data<CampaignService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match campaign_service.get_campaign(path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/campaigns/{id}",
    tag = "campaigns",
    params(
        ("id" = i64, Path, description = "Campaign id")
    ),
    request_body = UpdateCampaignRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Campaign updated", body = CampaignResponse),
        (status = 400, description = "Campaign is not active or update is invalid"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Campaign not found")
    )
)]
pub async fn update_campaign(
    campaign_service: web::Data<CampaignService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateCampaignRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match campaign_service
        .update_campaign(user.id, user.role, path.into_inner(), request.into_inner())
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
    post,
    path = "/campaigns/{id}/cancel",
    tag = "campaigns",
    params(
        ("id" = i64, Path, description = "Campaign id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Campaign cancelled", body = CampaignResponse),
        (status = 400, description = "Campaign is not active"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Campaign not found")
    )
)]
pub async fn cancel_campaign(
    campaign_service: web::Data<CampaignService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match campaign_service
        .cancel_campaign(user.id, user.role, path.into_inner())
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
    post,
    path = "/campaigns/{id}/relaunch",
    tag = "campaigns",
    params(
        ("id" = i64, Path, description = "Campaign to relaunch")
    ),
    request_body = CreateCampaignRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Successor campaign created", body = CampaignResponse),
        (status = 400, description = "Invalid campaign data"),
        (status = 403, description = "Only the owner may relaunch"),
        (status = 404, description = "Campaign not found")
    )
)]
pub async fn relaunch_campaign(
    campaign_service: web::Data<CampaignService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<CreateCampaignRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match campaign_service
        .relaunch_campaign(user.id, path.into_inner(), request.into_inner())
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
    get,
    path = "/campaigns/{id}/iterations",
    tag = "campaigns",
    params(
        ("id" = i64, Path, description = "Latest campaign in the chain")
    ),
    responses(
        (status = 200, description = "Relaunch chain, newest first"),
        (status = 404, description = "Campaign not found")
    )
)]
pub async fn campaign_iterations(
    campaign_service: web::Data<CampaignService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match campaign_service
        .get_campaign_iterations(path.into_inner())
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
    get,
    path = "/campaigns/{id}/donations",
    tag = "donations",
    params(
        ("id" = i64, Path, description = "Campaign id"),
        ("page" = Option<i64>, Query, description = "Page number"),
        ("page_size" = Option<i64>, Query, description = "Items per page")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Donations received by the campaign"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Campaign not found")
    )
)]
pub async fn campaign_donations(
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<TransactionQuery>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match payment_service
        .get_campaign_donations(user.id, user.role, path.into_inner(), &query.into_inner())
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
    post,
    path = "/campaigns/{id}/donations",
    tag = "donations",
    params(
        ("id" = i64, Path, description = "Campaign id")
    ),
    request_body = RecordDonationRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Donation recorded", body = TransactionResponse),
        (status = 400, description = "Invalid donation"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Campaign not found")
    )
)]
pub async fn record_donation(
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<RecordDonationRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match payment_service
        .record_donation(Some(user.id), path.into_inner(), request.into_inner())
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
    post,
    path = "/campaigns/{id}/donations/{transaction_id}/process",
    tag = "donations",
    params(
        ("id" = i64, Path, description = "Campaign id"),
        ("transaction_id" = i64, Path, description = "Transaction id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Pledge confirmed", body = TransactionResponse),
        (status = 400, description = "Transaction is not a pending manual pledge"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn process_donation(
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    let (campaign_id, transaction_id) = path.into_inner();
    match payment_service
        .process_transaction(user.id, campaign_id, transaction_id)
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
    post,
    path = "/campaigns/{id}/donations/{transaction_id}/refund",
    tag = "donations",
    params(
        ("id" = i64, Path, description = "Campaign id"),
        ("transaction_id" = i64, Path, description = "Transaction id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Donation refunded", body = TransactionResponse),
        (status = 400, description = "Transaction is not completed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn refund_donation(
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    let (campaign_id, transaction_id) = path.into_inner();
    match payment_service
        .refund_transaction(user.id, campaign_id, transaction_id)
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
    post,
    path = "/campaigns/{id}/payments",
    tag = "payments",
    params(
        ("id" = i64, Path, description = "Campaign id")
    ),
    request_body = InitiatePaymentRequest,
    responses(
        (status = 200, description = "Hosted payment page created", body = InitiatePaymentResponse),
        (status = 400, description = "Invalid amount or campaign is not active"),
        (status = 404, description = "Campaign not found"),
        (status = 502, description = "Payment gateway unavailable")
    )
)]
pub async fn initiate_payment(
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<InitiatePaymentRequest>,
) -> Result<HttpResponse> {
    // Anonymous donations are allowed; a valid token just attaches the donor.
    let donor_id = maybe_current_user(&req).map(|user| user.id);

    match payment_service
        .initiate_payment(donor_id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn campaign_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/campaigns")
            .route("", web::get().to(list_campaigns))
            .route("", web::post().to(create_campaign))
            .route("/{id}", web::get().to(get_campaign))
            .route("/{id}", web::put().to(update_campaign))
            .route("/{id}/cancel", web::post().to(cancel_campaign))
            .route("/{id}/relaunch", web::post().to(relaunch_campaign))
            .route("/{id}/iterations", web::get().to(campaign_iterations))
            .route("/{id}/donations", web::get().to(campaign_donations))
            .route("/{id}/donations", web::post().to(record_donation))
            .route(
                "/{id}/donations/{transaction_id}/process",
                web::post().to(process_donation),
            )
            .route(
                "/{id}/donations/{transaction_id}/refund",
                web::post().to(refund_donation),
            )
            .route("/{id}/payments", web::post().to(initiate_payment)),
    );
}
