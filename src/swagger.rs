use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::user::get_me,
        handlers::user::update_me,
        handlers::user::change_password,
        handlers::user::my_campaigns,
        handlers::user::my_donations,
        handlers::campaign::list_campaigns,
        handlers::campaign::create_campaign,
        handlers::campaign::get_campaign,
        handlers::campaign::update_campaign,
        handlers::campaign::cancel_campaign,
        handlers::campaign::relaunch_campaign,
        handlers::campaign::campaign_iterations,
        handlers::campaign::campaign_donations,
        handlers::campaign::record_donation,
        handlers::campaign::process_donation,
        handlers::campaign::refund_donation,
        handlers::campaign::initiate_payment,
        handlers::payment::gateway_status,
        handlers::payment::verify_payment,
        handlers::admin::drift_report,
        handlers::admin::user_donations,
        handlers::admin::delete_user,
        handlers::admin::delete_campaign,
    ),
    components(
        schemas(
            Role,
            User,
            UserResponse,
            UserStatistics,
            ProfileResponse,
            PublicProfile,
            RegisterRequest,
            LoginRequest,
            UpdateUserRequest,
            ChangePasswordRequest,
            AuthResponse,
            CampaignStatus,
            Campaign,
            CampaignResponse,
            CampaignDetailResponse,
            UserCampaignsResponse,
            CreateCampaignRequest,
            UpdateCampaignRequest,
            CampaignQuery,
            TransactionStatus,
            PaymentMethod,
            Transaction,
            TransactionResponse,
            TransactionQuery,
            InitiatePaymentRequest,
            InitiatePaymentResponse,
            RecordDonationRequest,
            WebhookPayload,
            VerifyQuery,
            VerificationView,
            GatewayStatusResponse,
            DriftEntry,
            DriftReport,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication API"),
        (name = "users", description = "User profile API"),
        (name = "campaigns", description = "Campaign management API"),
        (name = "donations", description = "Donation recording API"),
        (name = "payments", description = "Konnect payment API"),
        (name = "admin", description = "Administration API"),
    ),
    info(
        title = "Tadamon Backend API",
        version = "1.0.0",
        description = "Crowdfunding platform REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
