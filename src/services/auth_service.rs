use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::*;

#[derive(Clone)]
pub struct AuthService {
    pool: DbPool,
    jwt_service: JwtService,
}

impl AuthService {
    pub fn new(pool: DbPool, jwt_service: JwtService) -> Self {
        Self { pool, jwt_service }
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthResponse> {
        let username = request.username.trim().to_string();
        let length = username.chars().count();
        if length < 3 || length > 30 {
            return Err(AppError::ValidationError(
                "Username must be between 3 and 30 characters".to_string(),
            ));
        }

        let email = normalize_email(&request.email);
        validate_email(&email)?;
        validate_password(&request.password)?;

        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(&username)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::ValidationError(
                "Username is already taken".to_string(),
            ));
        }

        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::ValidationError(
                "Email is already registered".to_string(),
            ));
        }

        let birthdate = match &request.birthdate {
            Some(raw) => Some(parse_birthdate(raw)?),
            None => None,
        };

        let password_hash = hash_password(&request.password)?;

        let user_id = sqlx::query(
            "INSERT INTO users (username, email, password_hash, phone, birthdate) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&username)
        .bind(&email)
        .bind(&password_hash)
        .bind(&request.phone)
        .bind(birthdate)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        log::info!("User registered: id={user_id} username={username}");

        let user = self.get_user_by_id(user_id).await?;
        self.issue_tokens(user)
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let email = normalize_email(&request.email);

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;

        // Same message for unknown email and wrong password.
        let user =
            user.ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;
        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::AuthError(
                "Invalid email or password".to_string(),
            ));
        }

        self.issue_tokens(user)
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let claims = self.jwt_service.verify_refresh_token(refresh_token)?;
        let user_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

        let user = self.get_user_by_id(user_id).await?;
        let access_token = self.jwt_service.generate_access_token(user.id, user.role)?;

        Ok(AuthResponse {
            expires_in: self.jwt_service.get_access_token_expires_in(),
            access_token,
            refresh_token: refresh_token.to_string(),
            user: user.into(),
        })
    }

    fn issue_tokens(&self, user: User) -> AppResult<AuthResponse> {
        let access_token = self.jwt_service.generate_access_token(user.id, user.role)?;
        let refresh_token = self.jwt_service.generate_refresh_token(user.id, user.role)?;

        Ok(AuthResponse {
            expires_in: self.jwt_service.get_access_token_expires_in(),
            access_token,
            refresh_token,
            user: user.into(),
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

fn parse_birthdate(raw: &str) -> AppResult<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::ValidationError("Birthdate must be YYYY-MM-DD".to_string()))
}
