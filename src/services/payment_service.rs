use std::sync::Arc;

use uuid::Uuid;

use crate::config::UrlsConfig;
use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::external::{CreatePaymentRequest, GatewayPaymentStatus, PaymentGateway};
use crate::models::{
    Campaign, CampaignStatus, DriftEntry, DriftReport, GatewayStatusResponse,
    InitiatePaymentRequest, InitiatePaymentResponse, PaginatedResponse, PaginationParams,
    PaymentMethod, RecordDonationRequest, Role, Transaction, TransactionQuery,
    TransactionResponse, TransactionStatus, VerificationView, VerifyQuery, WebhookPayload,
};
use crate::utils::amount::{millimes_to_dinars, validate_positive_millimes};

/// Result of feeding a gateway signal into the transaction state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// This call performed the transition (and any aggregate updates).
    Applied,
    /// An earlier delivery already performed it; nothing changed.
    AlreadyApplied,
    /// The signal contradicts a terminal local state and was dropped.
    Ignored,
}

/// Orchestrates the life of a donation: gateway hand-off, webhook and
/// verify reconciliation, refunds, and manual pledge settlement. The
/// campaign aggregates (`donated_amount`, `donors_count`) are only ever
/// touched here, inside the same database transaction as the status
/// transition that justifies them.
#[derive(Clone)]
pub struct PaymentService {
    pool: DbPool,
    gateway: Arc<dyn PaymentGateway>,
    urls: UrlsConfig,
}

impl PaymentService {
    pub fn new(pool: DbPool, gateway: Arc<dyn PaymentGateway>, urls: UrlsConfig) -> Self {
        Self {
            pool,
            gateway,
            urls,
        }
    }

    /// Start a hosted-page donation. Registers the payment with the gateway
    /// first, then records a pending transaction carrying the gateway's
    /// reference. The caller gets the page URL to redirect the donor to.
    pub async fn initiate_payment(
        &self,
        donor_id: Option<i64>,
        campaign_id: i64,
        request: InitiatePaymentRequest,
    ) -> AppResult<InitiatePaymentResponse> {
        validate_positive_millimes(request.amount)?;

        let campaign = self.find_campaign(campaign_id).await?;
        if campaign.status != CampaignStatus::Active {
            return Err(AppError::InvalidState(
                "Campaign is not accepting donations".to_string(),
            ));
        }

        let description = request
            .description
            .clone()
            .unwrap_or_else(|| format!("Donation to {}", campaign.title));

        let gateway_request = CreatePaymentRequest {
            amount: request.amount,
            description,
            order_id: Uuid::new_v4().to_string(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            email: request.email.clone(),
            phone_number: request.phone_number.clone(),
            webhook_url: format!("{}/webhook/konnect", self.urls.backend_base_url),
            success_url: format!(
                "{}/payment/success?campaign={}&amount={}",
                self.urls.frontend_base_url, campaign.id, request.amount
            ),
            fail_url: format!(
                "{}/payment/failure?campaign={}&amount={}",
                self.urls.frontend_base_url, campaign.id, request.amount
            ),
        };

        let created = self.gateway.create_payment(&gateway_request).await?;

        let inserted = sqlx::query(
            "INSERT INTO transactions (donor_id, campaign_id, amount, method, status, payment_reference, description) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(donor_id)
        .bind(campaign.id)
        .bind(request.amount)
        .bind(PaymentMethod::Konnect)
        .bind(TransactionStatus::Pending)
        .bind(&created.payment_ref)
        .bind(&gateway_request.description)
        .execute(&self.pool)
        .await;

        if let Err(err) = inserted {
            // The gateway-side payment exists regardless. Surface the gap in
            // the reconciliation log and still hand the donor their URL; the
            // verify pull will flag the missing row again.
            log::error!(
                target: "reconciliation",
                "Gateway payment {} created but local insert failed: {err}",
                created.payment_ref
            );
        } else {
            log::info!(
                "Payment initiated: ref={} campaign={} amount={}",
                created.payment_ref,
                campaign.id,
                request.amount
            );
        }

        Ok(InitiatePaymentResponse {
            pay_url: created.pay_url,
            payment_ref: created.payment_ref,
        })
    }

    /// Apply a completion signal. The conditional UPDATE is the idempotency
    /// guard: only one caller can ever move a reference out of PENDING,
    /// however many webhook deliveries and verify pulls race for it, so the
    /// campaign aggregates are incremented exactly once per donation.
    pub async fn reconcile_completion(&self, payment_ref: &str) -> AppResult<ReconcileOutcome> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE transactions SET status = ?, updated_at = datetime('now') \
             WHERE payment_reference = ? AND status = ?",
        )
        .bind(TransactionStatus::Completed)
        .bind(payment_ref)
        .bind(TransactionStatus::Pending)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let existing = sqlx::query_as::<_, Transaction>(
                "SELECT * FROM transactions WHERE payment_reference = ?",
            )
            .bind(payment_ref)
            .fetch_optional(&mut *tx)
            .await?;

            return match existing {
                None => Err(AppError::PaymentNotFound(payment_ref.to_string())),
                Some(t) if t.status == TransactionStatus::Completed => {
                    log::info!("Completion for {payment_ref} already applied, ignoring duplicate");
                    Ok(ReconcileOutcome::AlreadyApplied)
                }
                Some(t) => {
                    log::error!(
                        target: "reconciliation",
                        "Completion signal for {payment_ref} conflicts with local status {}",
                        t.status
                    );
                    Err(AppError::InvalidState(format!(
                        "Transaction for {payment_ref} is {} and cannot be completed",
                        t.status
                    )))
                }
            };
        }

        let transaction = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE payment_reference = ?",
        )
        .bind(payment_ref)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE campaigns SET donated_amount = donated_amount + ?, donors_count = donors_count + 1, \
             updated_at = datetime('now') WHERE id = ?",
        )
        .bind(transaction.amount)
        .bind(transaction.campaign_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        log::info!(
            "Donation reconciled: ref={payment_ref} campaign={} amount={}",
            transaction.campaign_id,
            transaction.amount
        );
        Ok(ReconcileOutcome::Applied)
    }

    /// Apply a failure signal. Failures never touch the aggregates, and a
    /// failure arriving after a completion is dropped: COMPLETED only ever
    /// moves to REFUNDED, and only through an explicit refund.
    pub async fn reconcile_failure(&self, payment_ref: &str) -> AppResult<ReconcileOutcome> {
        let updated = sqlx::query(
            "UPDATE transactions SET status = ?, updated_at = datetime('now') \
             WHERE payment_reference = ? AND status = ?",
        )
        .bind(TransactionStatus::Failed)
        .bind(payment_ref)
        .bind(TransactionStatus::Pending)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() > 0 {
            log::info!("Payment {payment_ref} marked as failed");
            return Ok(ReconcileOutcome::Applied);
        }

        let existing = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE payment_reference = ?",
        )
        .bind(payment_ref)
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            None => Err(AppError::PaymentNotFound(payment_ref.to_string())),
            Some(t) if t.status == TransactionStatus::Failed => {
                Ok(ReconcileOutcome::AlreadyApplied)
            }
            Some(t) => {
                log::warn!(
                    target: "reconciliation",
                    "Failure signal for {payment_ref} dropped, local status is {}",
                    t.status
                );
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    /// Entry point for gateway webhook deliveries, the authoritative
    /// reconciliation path. Errors bubble up so the HTTP layer answers
    /// non-2xx and the gateway redelivers.
    pub async fn handle_webhook(&self, payload: &WebhookPayload) -> AppResult<()> {
        let status = GatewayPaymentStatus::from_gateway(&payload.status);
        match status {
            GatewayPaymentStatus::Completed => {
                self.reconcile_completion(&payload.payment_ref).await?;
            }
            GatewayPaymentStatus::Failed | GatewayPaymentStatus::Expired => {
                self.reconcile_failure(&payload.payment_ref).await?;
            }
            GatewayPaymentStatus::Pending | GatewayPaymentStatus::Unknown => {
                log::info!(
                    "Webhook for {} carried non-final status {:?}, nothing to do",
                    payload.payment_ref,
                    payload.status
                );
            }
        }
        Ok(())
    }

    /// Best-effort pull used by the redirect landing page. Asks the gateway
    /// for the current status, folds any final result into the state
    /// machine, and answers from local state. A dead gateway or a failed
    /// reconciliation degrades the view instead of failing the request; the
    /// webhook path remains the source of truth.
    pub async fn verify_payment(
        &self,
        payment_ref: &str,
        query: &VerifyQuery,
    ) -> AppResult<VerificationView> {
        let gateway_status = match self.gateway.get_payment_status(payment_ref).await {
            Ok(status) => Some(status),
            Err(AppError::PaymentNotFound(_)) => {
                return Err(AppError::PaymentNotFound(payment_ref.to_string()));
            }
            Err(err) => {
                log::warn!(
                    target: "reconciliation",
                    "Status pull for {payment_ref} failed: {err}"
                );
                None
            }
        };

        if let Some(status) = gateway_status {
            if status.is_success() {
                match self.reconcile_completion(payment_ref).await {
                    Ok(_) => {}
                    Err(AppError::PaymentNotFound(_)) => {
                        log::warn!(
                            target: "reconciliation",
                            "Gateway reports {payment_ref} completed but no local transaction exists"
                        );
                    }
                    Err(err) => {
                        log::warn!(
                            target: "reconciliation",
                            "Could not reconcile {payment_ref}: {err}"
                        );
                    }
                }
            } else if status.is_failure() {
                if let Err(err) = self.reconcile_failure(payment_ref).await {
                    log::warn!(
                        target: "reconciliation",
                        "Could not record failure for {payment_ref}: {err}"
                    );
                }
            }
        }

        let local = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE payment_reference = ?",
        )
        .bind(payment_ref)
        .fetch_optional(&self.pool)
        .await?;

        let reconciled = matches!(
            local.as_ref().map(|t| t.status),
            Some(TransactionStatus::Completed)
        );

        Ok(VerificationView {
            payment_ref: payment_ref.to_string(),
            gateway_status: gateway_status.map(|s| s.as_str().to_string()),
            status: local.as_ref().map(|t| t.status),
            campaign_id: local.as_ref().map(|t| t.campaign_id).or(query.campaign),
            amount: local
                .as_ref()
                .map(|t| millimes_to_dinars(t.amount))
                .or_else(|| query.amount.map(millimes_to_dinars)),
            reconciled,
        })
    }

    /// Raw gateway status for a reference, no reconciliation.
    pub async fn get_gateway_status(&self, payment_ref: &str) -> AppResult<GatewayStatusResponse> {
        let status = self.gateway.get_payment_status(payment_ref).await?;
        Ok(GatewayStatusResponse {
            payment_ref: payment_ref.to_string(),
            status: status.as_str().to_string(),
        })
    }

    /// Record a donation that does not go through the hosted gateway page.
    /// `card` settles immediately; `manual` stays a pledge until the
    /// campaign owner confirms it with [`Self::process_transaction`].
    pub async fn record_donation(
        &self,
        donor_id: Option<i64>,
        campaign_id: i64,
        request: RecordDonationRequest,
    ) -> AppResult<TransactionResponse> {
        validate_positive_millimes(request.amount)?;

        let status = match request.method {
            PaymentMethod::Card => TransactionStatus::Completed,
            PaymentMethod::Manual => TransactionStatus::Pending,
            PaymentMethod::Konnect => {
                return Err(AppError::ValidationError(
                    "Konnect donations go through payment initiation".to_string(),
                ));
            }
        };

        let mut tx = self.pool.begin().await?;

        let campaign = sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = ?")
            .bind(campaign_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))?;
        if campaign.status != CampaignStatus::Active {
            return Err(AppError::InvalidState(
                "Campaign is not accepting donations".to_string(),
            ));
        }

        let inserted = sqlx::query(
            "INSERT INTO transactions (donor_id, campaign_id, amount, method, status, description) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(donor_id)
        .bind(campaign.id)
        .bind(request.amount)
        .bind(request.method)
        .bind(status)
        .bind(&request.description)
        .execute(&mut *tx)
        .await?;
        let transaction_id = inserted.last_insert_rowid();

        if status == TransactionStatus::Completed {
            sqlx::query(
                "UPDATE campaigns SET donated_amount = donated_amount + ?, donors_count = donors_count + 1, \
                 updated_at = datetime('now') WHERE id = ?",
            )
            .bind(request.amount)
            .bind(campaign.id)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
            .bind(transaction_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Campaign owner confirms receipt of a manual pledge. Owner only;
    /// admins moderate campaigns but do not move money on them.
    /// Same guard shape as webhook reconciliation, keyed by id.
    pub async fn process_transaction(
        &self,
        actor_id: i64,
        campaign_id: i64,
        transaction_id: i64,
    ) -> AppResult<TransactionResponse> {
        let mut tx = self.pool.begin().await?;

        let (transaction, campaign) =
            Self::load_transaction_with_campaign(&mut tx, transaction_id).await?;
        if transaction.campaign_id != campaign_id {
            return Err(AppError::NotFound("Transaction not found".to_string()));
        }
        if campaign.user_id != actor_id {
            return Err(AppError::Forbidden);
        }
        if transaction.method != PaymentMethod::Manual {
            return Err(AppError::InvalidState(
                "Only manual pledges can be processed".to_string(),
            ));
        }

        let updated = sqlx::query(
            "UPDATE transactions SET status = ?, updated_at = datetime('now') \
             WHERE id = ? AND status = ?",
        )
        .bind(TransactionStatus::Completed)
        .bind(transaction_id)
        .bind(TransactionStatus::Pending)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::InvalidState(format!(
                "Only pending pledges can be processed, this one is {}",
                transaction.status
            )));
        }

        sqlx::query(
            "UPDATE campaigns SET donated_amount = donated_amount + ?, donors_count = donors_count + 1, \
             updated_at = datetime('now') WHERE id = ?",
        )
        .bind(transaction.amount)
        .bind(transaction.campaign_id)
        .execute(&mut *tx)
        .await?;

        let refreshed = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
            .bind(transaction_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        log::info!(
            "Pledge {transaction_id} confirmed for campaign {}",
            transaction.campaign_id
        );
        Ok(refreshed.into())
    }

    /// Campaign owner returns a completed donation. Owner only, like
    /// `process_transaction`. The aggregate roll-back rides in the same
    /// database transaction as the status flip, so a refund is counted out
    /// exactly once.
    pub async fn refund_transaction(
        &self,
        actor_id: i64,
        campaign_id: i64,
        transaction_id: i64,
    ) -> AppResult<TransactionResponse> {
        let mut tx = self.pool.begin().await?;

        let (transaction, campaign) =
            Self::load_transaction_with_campaign(&mut tx, transaction_id).await?;
        if transaction.campaign_id != campaign_id {
            return Err(AppError::NotFound("Transaction not found".to_string()));
        }
        if campaign.user_id != actor_id {
            return Err(AppError::Forbidden);
        }

        let updated = sqlx::query(
            "UPDATE transactions SET status = ?, updated_at = datetime('now') \
             WHERE id = ? AND status = ?",
        )
        .bind(TransactionStatus::Refunded)
        .bind(transaction_id)
        .bind(TransactionStatus::Completed)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::InvalidState(format!(
                "Only completed transactions can be refunded, this one is {}",
                transaction.status
            )));
        }

        sqlx::query(
            "UPDATE campaigns SET donated_amount = donated_amount - ?, donors_count = donors_count - 1, \
             updated_at = datetime('now') WHERE id = ?",
        )
        .bind(transaction.amount)
        .bind(transaction.campaign_id)
        .execute(&mut *tx)
        .await?;

        let refreshed = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
            .bind(transaction_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        log::info!(
            "Transaction {transaction_id} refunded, campaign {} rolled back {} millimes",
            transaction.campaign_id,
            transaction.amount
        );
        Ok(refreshed.into())
    }

    /// Donations received by a campaign, visible to its owner or an admin.
    pub async fn get_campaign_donations(
        &self,
        actor_id: i64,
        actor_role: Role,
        campaign_id: i64,
        query: &TransactionQuery,
    ) -> AppResult<PaginatedResponse<TransactionResponse>> {
        let campaign = self.find_campaign(campaign_id).await?;
        if campaign.user_id != actor_id && actor_role != Role::Admin {
            return Err(AppError::Forbidden);
        }

        let params = PaginationParams::new(query.page, query.page_size);

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE campaign_id = ?")
                .bind(campaign_id)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE campaign_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(campaign_id)
        .bind(params.get_limit())
        .bind(params.get_offset())
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<TransactionResponse> =
            rows.into_iter().map(TransactionResponse::from).collect();
        Ok(PaginatedResponse::new(
            items,
            params.get_page(),
            params.get_page_size(),
            total,
        ))
    }

    /// A donor's own giving history.
    pub async fn get_user_donations(
        &self,
        donor_id: i64,
        query: &TransactionQuery,
    ) -> AppResult<PaginatedResponse<TransactionResponse>> {
        let params = PaginationParams::new(query.page, query.page_size);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE donor_id = ?")
            .bind(donor_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE donor_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(donor_id)
        .bind(params.get_limit())
        .bind(params.get_offset())
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<TransactionResponse> =
            rows.into_iter().map(TransactionResponse::from).collect();
        Ok(PaginatedResponse::new(
            items,
            params.get_page(),
            params.get_page_size(),
            total,
        ))
    }

    /// Recomputes every campaign's aggregates from its completed
    /// transactions and reports the ones whose stored values disagree.
    /// Read-only; fixing drift is a deliberate operator action.
    pub async fn drift_report(&self) -> AppResult<DriftReport> {
        let entries = sqlx::query_as::<_, DriftEntry>(
            "SELECT c.id AS campaign_id, \
                    c.donated_amount AS stored_donated, \
                    COALESCE(SUM(CASE WHEN t.status = 'COMPLETED' THEN t.amount ELSE 0 END), 0) AS computed_donated, \
                    c.donors_count AS stored_donors, \
                    COALESCE(SUM(CASE WHEN t.status = 'COMPLETED' THEN 1 ELSE 0 END), 0) AS computed_donors \
             FROM campaigns c \
             LEFT JOIN transactions t ON t.campaign_id = c.id \
             GROUP BY c.id",
        )
        .fetch_all(&self.pool)
        .await?;

        let checked_campaigns = entries.len() as i64;
        let drifted: Vec<DriftEntry> = entries
            .into_iter()
            .filter(|e| {
                e.stored_donated != e.computed_donated || e.stored_donors != e.computed_donors
            })
            .collect();

        if !drifted.is_empty() {
            log::warn!(
                target: "reconciliation",
                "Aggregate drift detected on {} campaign(s)",
                drifted.len()
            );
        }

        Ok(DriftReport {
            checked_campaigns,
            drifted,
        })
    }

    async fn find_campaign(&self, campaign_id: i64) -> AppResult<Campaign> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = ?")
            .bind(campaign_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))
    }

    async fn load_transaction_with_campaign(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        transaction_id: i64,
    ) -> AppResult<(Transaction, Campaign)> {
        let transaction =
            sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
                .bind(transaction_id)
                .fetch_optional(&mut **tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

        let campaign = sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = ?")
            .bind(transaction.campaign_id)
            .fetch_one(&mut **tx)
            .await?;

        Ok((transaction, campaign))
    }
}
