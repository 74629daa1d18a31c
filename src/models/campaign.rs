use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::models::PublicProfile;
use crate::utils::amount::millimes_to_dinars;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Active,
    Completed,
    Cancelled,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Active => write!(f, "active"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Campaign {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub target_amount: i64,  // millimes
    pub donated_amount: i64, // millimes, authoritative running total
    pub donors_count: i64,
    pub end_date: Option<NaiveDate>,
    pub status: CampaignStatus,
    pub previous_iteration_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateCampaignRequest {
    #[schema(example = "Well for Douar El Amal")]
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "community")]
    pub category: Option<String>,
    /// Target in millimes (1 TND = 1000 millimes).
    #[schema(example = 50_000_000i64)]
    pub target_amount: i64,
    #[schema(example = "2026-12-31")]
    pub end_date: Option<String>, // YYYY-MM-DD
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateCampaignRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub end_date: Option<String>, // YYYY-MM-DD
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CampaignQuery {
    pub category: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CampaignResponse {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    /// Major units (dinars), exact.
    pub target_amount: Decimal,
    pub donated_amount: Decimal,
    pub donors_count: i64,
    pub end_date: Option<String>,
    pub status: CampaignStatus,
    pub previous_iteration_id: Option<i64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CampaignDetailResponse {
    #[serde(flatten)]
    pub campaign: CampaignResponse,
    pub owner: PublicProfile,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserCampaignsResponse {
    pub campaigns: Vec<CampaignResponse>,
    /// Sum of donated_amount across the campaigns, in major units.
    pub total_raised: Decimal,
}

impl From<Campaign> for CampaignResponse {
    fn from(c: Campaign) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            title: c.title,
            description: c.description,
            category: c.category,
            target_amount: millimes_to_dinars(c.target_amount),
            donated_amount: millimes_to_dinars(c.donated_amount),
            donors_count: c.donors_count,
            end_date: c.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
            status: c.status,
            previous_iteration_id: c.previous_iteration_id,
            created_at: c.created_at,
        }
    }
}
