use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::amount::millimes_to_dinars;
use crate::utils::{hash_password, validate_password, verify_password};

#[derive(Clone)]
pub struct UserService {
    pool: DbPool,
}

impl UserService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Own profile with giving statistics.
    pub async fn get_profile(&self, user_id: i64) -> AppResult<ProfileResponse> {
        let user = self.get_user_by_id(user_id).await?;
        let statistics = self.get_statistics(user_id).await?;

        Ok(ProfileResponse {
            user: user.into(),
            statistics,
        })
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        request: UpdateUserRequest,
    ) -> AppResult<UserResponse> {
        if request.username.is_none()
            && request.phone.is_none()
            && request.birthdate.is_none()
            && request.bio.is_none()
            && request.avatar_url.is_none()
        {
            return Err(AppError::ValidationError("No fields to update".to_string()));
        }

        let username = match &request.username {
            Some(name) => {
                let name = name.trim().to_string();
                let length = name.chars().count();
                if length < 3 || length > 30 {
                    return Err(AppError::ValidationError(
                        "Username must be between 3 and 30 characters".to_string(),
                    ));
                }
                let taken: Option<(i64,)> =
                    sqlx::query_as("SELECT id FROM users WHERE username = ? AND id != ?")
                        .bind(&name)
                        .bind(user_id)
                        .fetch_optional(&self.pool)
                        .await?;
                if taken.is_some() {
                    return Err(AppError::ValidationError(
                        "Username is already taken".to_string(),
                    ));
                }
                Some(name)
            }
            None => None,
        };

        let birthdate = match &request.birthdate {
            Some(raw) => Some(
                chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    AppError::ValidationError("Birthdate must be YYYY-MM-DD".to_string())
                })?,
            ),
            None => None,
        };

        let updated = sqlx::query(
            "UPDATE users SET \
                username = COALESCE(?, username), \
                phone = COALESCE(?, phone), \
                birthdate = COALESCE(?, birthdate), \
                bio = COALESCE(?, bio), \
                avatar_url = COALESCE(?, avatar_url), \
                updated_at = datetime('now') \
             WHERE id = ?",
        )
        .bind(username)
        .bind(&request.phone)
        .bind(birthdate)
        .bind(&request.bio)
        .bind(&request.avatar_url)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let user = self.get_user_by_id(user_id).await?;
        Ok(user.into())
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        request: ChangePasswordRequest,
    ) -> AppResult<()> {
        let user = self.get_user_by_id(user_id).await?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(AppError::AuthError(
                "Current password is incorrect".to_string(),
            ));
        }
        validate_password(&request.new_password)?;

        let password_hash = hash_password(&request.new_password)?;
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(&password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        log::info!("Password changed for user {user_id}");
        Ok(())
    }

    /// Admin-only. The FK rules cascade to the user's campaigns and to every
    /// transaction they own or donated. Removed donations leave the campaign
    /// aggregates untouched; the drift report picks up the gap.
    pub async fn delete_user(&self, user_id: i64) -> AppResult<()> {
        let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        log::info!("User {user_id} deleted");
        Ok(())
    }

    async fn get_statistics(&self, user_id: i64) -> AppResult<UserStatistics> {
        let campaigns_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM campaigns WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        let (donations_count, total_donated): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM transactions \
             WHERE donor_id = ? AND status = 'COMPLETED'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserStatistics {
            campaigns_count,
            donations_count,
            total_donated: millimes_to_dinars(total_donated),
        })
    }

    async fn get_user_by_id(&self, user_id: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[tokio::test]
    async fn test_profile_with_statistics() {
        let pool = test_pool().await;
        let service = UserService::new(pool.clone());
        let user = seed_user(&pool, "amira").await;
        let other = seed_user(&pool, "owner").await;
        let own_campaign = seed_campaign(&pool, user, 100_000).await;
        let other_campaign = seed_campaign(&pool, other, 100_000).await;
        seed_transaction(&pool, Some(user), other_campaign, 5000, "card", "COMPLETED", None).await;
        seed_transaction(&pool, Some(user), other_campaign, 3000, "card", "COMPLETED", None).await;
        // Pending and failed donations do not count.
        seed_transaction(&pool, Some(user), other_campaign, 900, "manual", "PENDING", None).await;
        seed_transaction(&pool, Some(user), own_campaign, 700, "konnect", "FAILED", Some("pf")).await;

        let profile = service.get_profile(user).await.unwrap();
        assert_eq!(profile.user.username, "amira");
        assert_eq!(profile.statistics.campaigns_count, 1);
        assert_eq!(profile.statistics.donations_count, 2);
        assert_eq!(profile.statistics.total_donated, millimes_to_dinars(8000));
    }

    #[tokio::test]
    async fn test_update_profile_partial() {
        let pool = test_pool().await;
        let service = UserService::new(pool.clone());
        let user = seed_user(&pool, "amira").await;

        let updated = service
            .update_profile(
                user,
                UpdateUserRequest {
                    username: None,
                    phone: Some("+21620123456".to_string()),
                    birthdate: None,
                    bio: Some("Giving back".to_string()),
                    avatar_url: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.username, "amira");
        assert_eq!(updated.phone.as_deref(), Some("+21620123456"));
        assert_eq!(updated.bio.as_deref(), Some("Giving back"));

        let err = service
            .update_profile(
                user,
                UpdateUserRequest {
                    username: None,
                    phone: None,
                    birthdate: None,
                    bio: None,
                    avatar_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_update_profile_username_counts_characters() {
        let pool = test_pool().await;
        let service = UserService::new(pool.clone());
        let user = seed_user(&pool, "amira").await;

        // 16 Arabic letters weigh 32 bytes but count as 16 characters.
        let arabic = "م".repeat(16);
        let updated = service
            .update_profile(
                user,
                UpdateUserRequest {
                    username: Some(arabic.clone()),
                    phone: None,
                    birthdate: None,
                    bio: None,
                    avatar_url: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.username, arabic);

        let err = service
            .update_profile(
                user,
                UpdateUserRequest {
                    username: Some("مي".to_string()),
                    phone: None,
                    birthdate: None,
                    bio: None,
                    avatar_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_update_profile_rejects_taken_username() {
        let pool = test_pool().await;
        let service = UserService::new(pool.clone());
        let user = seed_user(&pool, "amira").await;
        seed_user(&pool, "taken").await;

        let err = service
            .update_profile(
                user,
                UpdateUserRequest {
                    username: Some("taken".to_string()),
                    phone: None,
                    birthdate: None,
                    bio: None,
                    avatar_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_change_password() {
        let pool = test_pool().await;
        let service = UserService::new(pool.clone());
        let user = seed_user(&pool, "amira").await;
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(crate::utils::hash_password("Password123").unwrap())
            .bind(user)
            .execute(&pool)
            .await
            .unwrap();

        let err = service
            .change_password(
                user,
                ChangePasswordRequest {
                    current_password: "WrongPass1".to_string(),
                    new_password: "NewPassword1".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));

        service
            .change_password(
                user,
                ChangePasswordRequest {
                    current_password: "Password123".to_string(),
                    new_password: "NewPassword1".to_string(),
                },
            )
            .await
            .unwrap();

        let hash: (String,) = sqlx::query_as("SELECT password_hash FROM users WHERE id = ?")
            .bind(user)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(verify_password("NewPassword1", &hash.0).unwrap());
    }

    #[tokio::test]
    async fn test_delete_user_cascades_campaigns_and_donations() {
        let pool = test_pool().await;
        let service = UserService::new(pool.clone());
        let owner = seed_user(&pool, "owner").await;
        let donor = seed_user(&pool, "donor").await;
        let campaign = seed_campaign(&pool, owner, 100_000).await;
        let donation =
            seed_transaction(&pool, Some(donor), campaign, 5000, "card", "COMPLETED", None).await;
        // An anonymous donation has no donor to cascade from.
        seed_transaction(&pool, None, campaign, 2000, "card", "COMPLETED", None).await;

        service.delete_user(donor).await.unwrap();

        let donated_rows: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE id = ?")
                .bind(donation)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(donated_rows, 0);
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 1);

        service.delete_user(owner).await.unwrap();
        let campaigns: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM campaigns")
            .fetch_one(&pool)
            .await
            .unwrap();
        let transactions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(campaigns, 0);
        assert_eq!(transactions, 0);

        let err = service.delete_user(owner).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
