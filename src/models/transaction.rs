use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::utils::amount::millimes_to_dinars;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "PENDING"),
            TransactionStatus::Completed => write!(f, "COMPLETED"),
            TransactionStatus::Failed => write!(f, "FAILED"),
            TransactionStatus::Refunded => write!(f, "REFUNDED"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Konnect,
    Card,
    Manual,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Konnect => write!(f, "konnect"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Transaction {
    pub id: i64,
    pub donor_id: Option<i64>,
    pub campaign_id: i64,
    pub amount: i64, // millimes
    pub method: PaymentMethod,
    pub status: TransactionStatus,
    pub payment_reference: Option<String>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct InitiatePaymentRequest {
    /// Donation amount in millimes (1 TND = 1000 millimes).
    #[schema(example = 5000i64)]
    pub amount: i64,
    pub description: Option<String>,
    #[schema(example = "Amira")]
    pub first_name: Option<String>,
    #[schema(example = "Ben Salah")]
    pub last_name: Option<String>,
    #[schema(example = "amira@example.com")]
    pub email: Option<String>,
    #[schema(example = "+21620123456")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InitiatePaymentResponse {
    pub pay_url: String,
    pub payment_ref: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RecordDonationRequest {
    /// Donation amount in millimes.
    #[schema(example = 5000i64)]
    pub amount: i64,
    /// `card` records a settled donation immediately; `manual` records a
    /// pledge the campaign owner later confirms.
    pub method: PaymentMethod,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub id: i64,
    pub donor_id: Option<i64>,
    pub campaign_id: i64,
    /// Major units (dinars), exact.
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: TransactionStatus,
    pub payment_reference: Option<String>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            donor_id: t.donor_id,
            campaign_id: t.campaign_id,
            amount: millimes_to_dinars(t.amount),
            method: t.method,
            status: t.status,
            payment_reference: t.payment_reference,
            description: t.description,
            created_at: t.created_at,
        }
    }
}

/// Webhook payload pushed by the gateway. Shape is validated strictly;
/// anything else is rejected before it reaches reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct WebhookPayload {
    pub payment_ref: String,
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyQuery {
    /// Campaign id hint carried through the redirect URL.
    pub campaign: Option<i64>,
    /// Amount hint in millimes carried through the redirect URL.
    pub amount: Option<i64>,
}

/// Outcome of a verify pull, shaped for the redirect landing page. When the
/// local record is missing or an internal error occurred, `reconciled` stays
/// false and the amount/campaign fields fall back to the redirect hints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerificationView {
    pub payment_ref: String,
    pub gateway_status: Option<String>,
    pub status: Option<TransactionStatus>,
    pub campaign_id: Option<i64>,
    pub amount: Option<Decimal>,
    pub reconciled: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GatewayStatusResponse {
    pub payment_ref: String,
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransactionQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// One campaign whose stored aggregates disagree with its transaction
/// history. Surfaced by the admin drift report.
#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DriftEntry {
    pub campaign_id: i64,
    pub stored_donated: i64,
    pub computed_donated: i64,
    pub stored_donors: i64,
    pub computed_donors: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DriftReport {
    pub checked_campaigns: i64,
    pub drifted: Vec<DriftEntry>,
}
