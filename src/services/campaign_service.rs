use chrono::NaiveDate;

use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::amount::{millimes_to_dinars, validate_positive_millimes};

const MAX_ITERATION_CHAIN: usize = 100;

#[derive(Clone)]
pub struct CampaignService {
    pool: DbPool,
}

impl CampaignService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create_campaign(
        &self,
        user_id: i64,
        request: CreateCampaignRequest,
    ) -> AppResult<CampaignResponse> {
        let fields = validate_campaign_fields(&request)?;

        let campaign_id = sqlx::query(
            "INSERT INTO campaigns (user_id, title, description, category, target_amount, end_date) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.category)
        .bind(request.target_amount)
        .bind(fields.end_date)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        log::info!("Campaign created: id={campaign_id} user={user_id}");
        let campaign = self.find_campaign(campaign_id).await?;
        Ok(campaign.into())
    }

    /// Owner (or an admin) edits the descriptive fields. Only active
    /// campaigns are editable; money fields are never touched here.
    pub async fn update_campaign(
        &self,
        actor_id: i64,
        actor_role: Role,
        campaign_id: i64,
        request: UpdateCampaignRequest,
    ) -> AppResult<CampaignResponse> {
        let campaign = self.find_campaign(campaign_id).await?;
        if campaign.user_id != actor_id && actor_role != Role::Admin {
            return Err(AppError::Forbidden);
        }
        if campaign.status != CampaignStatus::Active {
            return Err(AppError::InvalidState(
                "Only active campaigns can be edited".to_string(),
            ));
        }

        if request.title.is_none()
            && request.description.is_none()
            && request.category.is_none()
            && request.end_date.is_none()
        {
            return Err(AppError::ValidationError("No fields to update".to_string()));
        }

        let title = match &request.title {
            Some(t) => Some(validate_title(t)?),
            None => None,
        };
        let end_date = match &request.end_date {
            Some(raw) => Some(parse_future_date(raw)?),
            None => None,
        };

        sqlx::query(
            "UPDATE campaigns SET \
                title = COALESCE(?, title), \
                description = COALESCE(?, description), \
                category = COALESCE(?, category), \
                end_date = COALESCE(?, end_date), \
                updated_at = datetime('now') \
             WHERE id = ?",
        )
        .bind(title)
        .bind(&request.description)
        .bind(&request.category)
        .bind(end_date)
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;

        let campaign = self.find_campaign(campaign_id).await?;
        Ok(campaign.into())
    }

    /// Stop collecting. The conditional UPDATE makes a second cancel (or a
    /// cancel racing a relaunch) fail loudly instead of silently.
    pub async fn cancel_campaign(
        &self,
        actor_id: i64,
        actor_role: Role,
        campaign_id: i64,
    ) -> AppResult<CampaignResponse> {
        let campaign = self.find_campaign(campaign_id).await?;
        if campaign.user_id != actor_id && actor_role != Role::Admin {
            return Err(AppError::Forbidden);
        }

        let updated = sqlx::query(
            "UPDATE campaigns SET status = ?, updated_at = datetime('now') \
             WHERE id = ? AND status = ?",
        )
        .bind(CampaignStatus::Cancelled)
        .bind(campaign_id)
        .bind(CampaignStatus::Active)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::InvalidState(format!(
                "Only active campaigns can be cancelled, this one is {}",
                campaign.status
            )));
        }

        log::info!("Campaign {campaign_id} cancelled");
        let campaign = self.find_campaign(campaign_id).await?;
        Ok(campaign.into())
    }

    /// Start a fresh iteration of an earlier campaign. The new campaign
    /// links back through `previous_iteration_id`; an active predecessor is
    /// closed as completed in the same database transaction. Relaunching is
    /// reserved to the original owner.
    pub async fn relaunch_campaign(
        &self,
        actor_id: i64,
        predecessor_id: i64,
        request: CreateCampaignRequest,
    ) -> AppResult<CampaignResponse> {
        let fields = validate_campaign_fields(&request)?;

        let mut tx = self.pool.begin().await?;

        let predecessor = sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = ?")
            .bind(predecessor_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))?;
        if predecessor.user_id != actor_id {
            return Err(AppError::Forbidden);
        }

        if predecessor.status == CampaignStatus::Active {
            sqlx::query(
                "UPDATE campaigns SET status = ?, updated_at = datetime('now') WHERE id = ?",
            )
            .bind(CampaignStatus::Completed)
            .bind(predecessor_id)
            .execute(&mut *tx)
            .await?;
        }

        let campaign_id = sqlx::query(
            "INSERT INTO campaigns \
                (user_id, title, description, category, target_amount, end_date, previous_iteration_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(actor_id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.category)
        .bind(request.target_amount)
        .bind(fields.end_date)
        .bind(predecessor_id)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;

        log::info!("Campaign {predecessor_id} relaunched as {campaign_id}");
        let campaign = self.find_campaign(campaign_id).await?;
        Ok(campaign.into())
    }

    /// Public detail view with the owner's public profile attached.
    pub async fn get_campaign(&self, campaign_id: i64) -> AppResult<CampaignDetailResponse> {
        let campaign = self.find_campaign(campaign_id).await?;

        let owner = sqlx::query_as::<_, PublicProfile>(
            "SELECT id, username, bio, avatar_url FROM users WHERE id = ?",
        )
        .bind(campaign.user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(CampaignDetailResponse {
            campaign: campaign.into(),
            owner,
        })
    }

    /// Public listing, newest first, optionally narrowed to a category.
    pub async fn list_campaigns(
        &self,
        query: &CampaignQuery,
    ) -> AppResult<PaginatedResponse<CampaignResponse>> {
        let params = PaginationParams::new(query.page, query.page_size);

        let (total, rows): (i64, Vec<Campaign>) = match &query.category {
            Some(category) => {
                let total =
                    sqlx::query_scalar("SELECT COUNT(*) FROM campaigns WHERE category = ?")
                        .bind(category)
                        .fetch_one(&self.pool)
                        .await?;
                let rows = sqlx::query_as::<_, Campaign>(
                    "SELECT * FROM campaigns WHERE category = ? \
                     ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                )
                .bind(category)
                .bind(params.get_limit())
                .bind(params.get_offset())
                .fetch_all(&self.pool)
                .await?;
                (total, rows)
            }
            None => {
                let total = sqlx::query_scalar("SELECT COUNT(*) FROM campaigns")
                    .fetch_one(&self.pool)
                    .await?;
                let rows = sqlx::query_as::<_, Campaign>(
                    "SELECT * FROM campaigns ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                )
                .bind(params.get_limit())
                .bind(params.get_offset())
                .fetch_all(&self.pool)
                .await?;
                (total, rows)
            }
        };

        let items: Vec<CampaignResponse> = rows.into_iter().map(CampaignResponse::from).collect();
        Ok(PaginatedResponse::new(
            items,
            params.get_page(),
            params.get_page_size(),
            total,
        ))
    }

    /// All campaigns of one user plus the total they have raised.
    pub async fn get_user_campaigns(&self, user_id: i64) -> AppResult<UserCampaignsResponse> {
        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let rows = sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let total_raised: i64 = rows.iter().map(|c| c.donated_amount).sum();

        Ok(UserCampaignsResponse {
            campaigns: rows.into_iter().map(CampaignResponse::from).collect(),
            total_raised: millimes_to_dinars(total_raised),
        })
    }

    /// The relaunch chain for a campaign, newest first, walking the
    /// `previous_iteration_id` links back to the first iteration.
    pub async fn get_campaign_iterations(
        &self,
        campaign_id: i64,
    ) -> AppResult<Vec<CampaignResponse>> {
        let mut chain = Vec::new();
        let mut cursor = Some(campaign_id);

        while let Some(id) = cursor {
            if chain.len() >= MAX_ITERATION_CHAIN {
                log::warn!("Iteration chain for campaign {campaign_id} truncated");
                break;
            }
            // The requested campaign must exist; broken links further back
            // end the chain quietly.
            let campaign = if chain.is_empty() {
                Some(self.find_campaign(id).await?)
            } else {
                sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            };
            match campaign {
                Some(c) => {
                    cursor = c.previous_iteration_id;
                    chain.push(CampaignResponse::from(c));
                }
                None => break,
            }
        }

        Ok(chain)
    }

    /// Admin-only removal; transactions follow through the FK cascade.
    pub async fn delete_campaign(&self, campaign_id: i64) -> AppResult<()> {
        let deleted = sqlx::query("DELETE FROM campaigns WHERE id = ?")
            .bind(campaign_id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound("Campaign not found".to_string()));
        }

        log::info!("Campaign {campaign_id} deleted");
        Ok(())
    }

    async fn find_campaign(&self, campaign_id: i64) -> AppResult<Campaign> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = ?")
            .bind(campaign_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))
    }
}

struct CampaignFields {
    title: String,
    description: String,
    category: String,
    end_date: Option<NaiveDate>,
}

fn validate_campaign_fields(request: &CreateCampaignRequest) -> AppResult<CampaignFields> {
    let title = validate_title(&request.title)?;
    validate_positive_millimes(request.target_amount)?;

    let end_date = match &request.end_date {
        Some(raw) => Some(parse_future_date(raw)?),
        None => None,
    };

    Ok(CampaignFields {
        title,
        description: request.description.clone().unwrap_or_default(),
        category: request
            .category
            .clone()
            .unwrap_or_else(|| "general".to_string()),
        end_date,
    })
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim().to_string();
    // Characters, not bytes; Arabic titles weigh two bytes a letter.
    let length = title.chars().count();
    if length < 3 || length > 120 {
        return Err(AppError::ValidationError(
            "Title must be between 3 and 120 characters".to_string(),
        ));
    }
    Ok(title)
}

fn parse_future_date(raw: &str) -> AppResult<NaiveDate> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError("End date must be YYYY-MM-DD".to_string()))?;
    if date < chrono::Utc::now().date_naive() {
        return Err(AppError::ValidationError(
            "End date cannot be in the past".to_string(),
        ));
    }
    Ok(date)
}
