//! Shared fixtures for service-level tests. Everything runs against an
//! in-memory SQLite database with the real migrations applied.

use std::str::FromStr;
use std::sync::Mutex;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::config::UrlsConfig;
use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::external::{
    CreatePaymentRequest, CreatedPayment, GatewayPaymentStatus, PaymentGateway,
};
use crate::models::TransactionStatus;

/// Fresh in-memory database with the full schema. A single connection keeps
/// every query in the test on the same `:memory:` instance.
pub async fn test_pool() -> DbPool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

pub fn test_urls() -> UrlsConfig {
    UrlsConfig {
        frontend_base_url: "https://front.test".to_string(),
        backend_base_url: "https://backend.test".to_string(),
    }
}

pub async fn seed_user(pool: &DbPool, username: &str) -> i64 {
    sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)")
        .bind(username)
        .bind(format!("{username}@example.com"))
        .bind("$2b$12$AAAAAAAAAAAAAAAAAAAAAeKn3rckzkmSN9KtRYkM0ZOOEFH5lzQEq")
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn seed_admin(pool: &DbPool, username: &str) -> i64 {
    sqlx::query("INSERT INTO users (username, email, password_hash, role) VALUES (?, ?, ?, 'admin')")
        .bind(username)
        .bind(format!("{username}@example.com"))
        .bind("$2b$12$AAAAAAAAAAAAAAAAAAAAAeKn3rckzkmSN9KtRYkM0ZOOEFH5lzQEq")
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn seed_campaign(pool: &DbPool, user_id: i64, target_millimes: i64) -> i64 {
    sqlx::query("INSERT INTO campaigns (user_id, title, target_amount) VALUES (?, 'Test campaign', ?)")
        .bind(user_id)
        .bind(target_millimes)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

#[allow(clippy::too_many_arguments)]
pub async fn seed_transaction(
    pool: &DbPool,
    donor_id: Option<i64>,
    campaign_id: i64,
    amount: i64,
    method: &str,
    status: &str,
    payment_reference: Option<&str>,
) -> i64 {
    sqlx::query(
        "INSERT INTO transactions (donor_id, campaign_id, amount, method, status, payment_reference) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(donor_id)
    .bind(campaign_id)
    .bind(amount)
    .bind(method)
    .bind(status)
    .bind(payment_reference)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn set_campaign_status(pool: &DbPool, campaign_id: i64, status: &str) {
    sqlx::query("UPDATE campaigns SET status = ? WHERE id = ?")
        .bind(status)
        .bind(campaign_id)
        .execute(pool)
        .await
        .unwrap();
}

/// (donated_amount, donors_count) for a campaign.
pub async fn campaign_aggregates(pool: &DbPool, campaign_id: i64) -> (i64, i64) {
    sqlx::query_as::<_, (i64, i64)>(
        "SELECT donated_amount, donors_count FROM campaigns WHERE id = ?",
    )
    .bind(campaign_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn transaction_status(pool: &DbPool, transaction_id: i64) -> TransactionStatus {
    sqlx::query_as::<_, (TransactionStatus,)>("SELECT status FROM transactions WHERE id = ?")
        .bind(transaction_id)
        .fetch_one(pool)
        .await
        .unwrap()
        .0
}

pub async fn transaction_id_for_reference(pool: &DbPool, payment_ref: &str) -> i64 {
    sqlx::query_as::<_, (i64,)>("SELECT id FROM transactions WHERE payment_reference = ?")
        .bind(payment_ref)
        .fetch_one(pool)
        .await
        .unwrap()
        .0
}

/// Gateway that refuses every call, for exercising unavailability paths.
pub struct DownGateway;

#[async_trait::async_trait]
impl PaymentGateway for DownGateway {
    async fn create_payment(&self, _request: &CreatePaymentRequest) -> AppResult<CreatedPayment> {
        Err(AppError::GatewayUnavailable("connection refused".to_string()))
    }

    async fn get_payment_status(&self, _payment_ref: &str) -> AppResult<GatewayPaymentStatus> {
        Err(AppError::GatewayUnavailable("connection refused".to_string()))
    }
}

/// Gateway that hands out one fixed reference and a scriptable status.
/// Useful for forcing reference collisions and divergent pull results.
pub struct FixedRefGateway {
    pub reference: String,
    pub status: Mutex<GatewayPaymentStatus>,
}

impl FixedRefGateway {
    pub fn new(reference: &str) -> Self {
        Self {
            reference: reference.to_string(),
            status: Mutex::new(GatewayPaymentStatus::Pending),
        }
    }

    pub fn set_status(&self, status: GatewayPaymentStatus) {
        *self.status.lock().unwrap() = status;
    }
}

#[async_trait::async_trait]
impl PaymentGateway for FixedRefGateway {
    async fn create_payment(&self, _request: &CreatePaymentRequest) -> AppResult<CreatedPayment> {
        Ok(CreatedPayment {
            pay_url: format!("https://gateway.test/pay/{}", self.reference),
            payment_ref: self.reference.clone(),
        })
    }

    async fn get_payment_status(&self, payment_ref: &str) -> AppResult<GatewayPaymentStatus> {
        if payment_ref != self.reference {
            return Err(AppError::PaymentNotFound(payment_ref.to_string()));
        }
        Ok(*self.status.lock().unwrap())
    }
}
