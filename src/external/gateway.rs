use crate::error::AppResult;
use async_trait::async_trait;

/// Everything the orchestrator needs from a payment processor. The live
/// Konnect client and the in-process sandbox both implement this; which one
/// is wired in is decided by configuration at startup, never by branching
/// inside business logic.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register a payment with the gateway and obtain the hosted payment
    /// page URL plus the gateway-assigned reference. A failure here means
    /// the payment must be assumed to not exist.
    async fn create_payment(&self, request: &CreatePaymentRequest) -> AppResult<CreatedPayment>;

    /// Current gateway-side status for a reference.
    async fn get_payment_status(&self, payment_ref: &str) -> AppResult<GatewayPaymentStatus>;
}

/// Amounts are integer millimes; the orchestrator owns any conversion to
/// the major unit.
#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub amount: i64,
    pub description: String,
    /// Internal correlation id forwarded to the gateway as the order id.
    pub order_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub webhook_url: String,
    pub success_url: String,
    pub fail_url: String,
}

#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub pay_url: String,
    pub payment_ref: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayPaymentStatus {
    Completed,
    Pending,
    Failed,
    Expired,
    Unknown,
}

impl GatewayPaymentStatus {
    /// Maps the gateway's wire status strings. Unrecognized statuses become
    /// `Unknown`, which reconciliation treats as "no state change yet".
    pub fn from_gateway(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "completed" | "success" | "paid" => GatewayPaymentStatus::Completed,
            "pending" | "in_progress" | "processing" => GatewayPaymentStatus::Pending,
            "failed" | "failed_payment" | "abandoned" | "canceled" | "cancelled" => {
                GatewayPaymentStatus::Failed
            }
            "expired" => GatewayPaymentStatus::Expired,
            _ => GatewayPaymentStatus::Unknown,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GatewayPaymentStatus::Completed)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            GatewayPaymentStatus::Failed | GatewayPaymentStatus::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayPaymentStatus::Completed => "completed",
            GatewayPaymentStatus::Pending => "pending",
            GatewayPaymentStatus::Failed => "failed",
            GatewayPaymentStatus::Expired => "expired",
            GatewayPaymentStatus::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayPaymentStatus::from_gateway("completed"),
            GatewayPaymentStatus::Completed
        );
        assert_eq!(
            GatewayPaymentStatus::from_gateway("COMPLETED"),
            GatewayPaymentStatus::Completed
        );
        assert_eq!(
            GatewayPaymentStatus::from_gateway("pending"),
            GatewayPaymentStatus::Pending
        );
        assert_eq!(
            GatewayPaymentStatus::from_gateway("failed_payment"),
            GatewayPaymentStatus::Failed
        );
        assert_eq!(
            GatewayPaymentStatus::from_gateway("expired"),
            GatewayPaymentStatus::Expired
        );
        assert_eq!(
            GatewayPaymentStatus::from_gateway("???"),
            GatewayPaymentStatus::Unknown
        );
    }

    #[test]
    fn test_success_failure_partition() {
        assert!(GatewayPaymentStatus::Completed.is_success());
        assert!(!GatewayPaymentStatus::Completed.is_failure());
        assert!(GatewayPaymentStatus::Failed.is_failure());
        assert!(GatewayPaymentStatus::Expired.is_failure());
        assert!(!GatewayPaymentStatus::Pending.is_success());
        assert!(!GatewayPaymentStatus::Pending.is_failure());
        assert!(!GatewayPaymentStatus::Unknown.is_failure());
    }
}
