use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::external::gateway::{
    CreatePaymentRequest, CreatedPayment, GatewayPaymentStatus, PaymentGateway,
};

/// In-process stand-in for Konnect, selected with `[konnect] mode = "sandbox"`.
/// Every created payment starts out pending; operators (and tests) move it
/// along with `set_status`. Nothing here ever touches the network.
pub struct SandboxGateway {
    payments: Mutex<HashMap<String, GatewayPaymentStatus>>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self {
            payments: Mutex::new(HashMap::new()),
        }
    }

    /// Number of payments created since startup.
    pub fn created_count(&self) -> AppResult<usize> {
        Ok(self.lock_payments()?.len())
    }

    /// Script the outcome of a sandbox payment.
    pub fn set_status(&self, payment_ref: &str, status: GatewayPaymentStatus) -> AppResult<()> {
        let mut payments = self.lock_payments()?;
        if !payments.contains_key(payment_ref) {
            return Err(AppError::PaymentNotFound(payment_ref.to_string()));
        }
        payments.insert(payment_ref.to_string(), status);
        Ok(())
    }

    fn lock_payments(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<String, GatewayPaymentStatus>>> {
        self.payments
            .lock()
            .map_err(|_| AppError::InternalError("sandbox gateway state lock poisoned".to_string()))
    }

    fn generate_ref() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        format!("sbx_{suffix}")
    }
}

impl Default for SandboxGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_payment(&self, request: &CreatePaymentRequest) -> AppResult<CreatedPayment> {
        let payment_ref = Self::generate_ref();
        let pay_url = format!("https://sandbox.konnect.invalid/pay/{payment_ref}");

        let mut payments = self.lock_payments()?;
        payments.insert(payment_ref.clone(), GatewayPaymentStatus::Pending);

        log::info!(
            "Sandbox payment created: ref={payment_ref} amount={} order_id={}",
            request.amount,
            request.order_id
        );

        Ok(CreatedPayment {
            pay_url,
            payment_ref,
        })
    }

    async fn get_payment_status(&self, payment_ref: &str) -> AppResult<GatewayPaymentStatus> {
        let payments = self.lock_payments()?;
        payments
            .get(payment_ref)
            .copied()
            .ok_or_else(|| AppError::PaymentNotFound(payment_ref.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> CreatePaymentRequest {
        CreatePaymentRequest {
            amount: 10000,
            description: "Donation".to_string(),
            order_id: "order-1".to_string(),
            first_name: None,
            last_name: None,
            email: None,
            phone_number: None,
            webhook_url: "https://backend.test/webhook/konnect".to_string(),
            success_url: "https://front.test/done".to_string(),
            fail_url: "https://front.test/failed".to_string(),
        }
    }

    #[tokio::test]
    async fn test_created_payment_starts_pending() {
        let gateway = SandboxGateway::new();
        let created = gateway.create_payment(&sample_request()).await.unwrap();

        assert!(created.payment_ref.starts_with("sbx_"));
        assert!(created.pay_url.contains(&created.payment_ref));
        assert_eq!(
            gateway.get_payment_status(&created.payment_ref).await.unwrap(),
            GatewayPaymentStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_scripted_status_transition() {
        let gateway = SandboxGateway::new();
        let created = gateway.create_payment(&sample_request()).await.unwrap();

        gateway
            .set_status(&created.payment_ref, GatewayPaymentStatus::Completed)
            .unwrap();
        assert_eq!(
            gateway.get_payment_status(&created.payment_ref).await.unwrap(),
            GatewayPaymentStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_unknown_reference_is_not_found() {
        let gateway = SandboxGateway::new();

        let err = gateway.get_payment_status("sbx_missing").await.unwrap_err();
        assert!(matches!(err, AppError::PaymentNotFound(_)));

        let err = gateway
            .set_status("sbx_missing", GatewayPaymentStatus::Completed)
            .unwrap_err();
        assert!(matches!(err, AppError::PaymentNotFound(_)));
    }

    #[tokio::test]
    async fn test_references_are_unique() {
        let gateway = SandboxGateway::new();
        let a = gateway.create_payment(&sample_request()).await.unwrap();
        let b = gateway.create_payment(&sample_request()).await.unwrap();
        assert_ne!(a.payment_ref, b.payment_ref);
    }
}
