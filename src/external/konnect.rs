use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::KonnectConfig;
use crate::error::{AppError, AppResult};
use crate::external::gateway::{
    CreatePaymentRequest, CreatedPayment, GatewayPaymentStatus, PaymentGateway,
};

/// Wire format of the init-payment call. Konnect speaks camelCase JSON.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KonnectInitRequest {
    receiver_wallet_id: String,
    token: String,
    amount: i64,
    #[serde(rename = "type")]
    payment_type: String,
    description: String,
    accepted_payment_methods: Vec<String>,
    lifespan: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    order_id: String,
    webhook: String,
    silent_webhook: bool,
    success_url: String,
    fail_url: String,
    theme: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KonnectInitResponse {
    pay_url: String,
    payment_ref: String,
}

#[derive(Debug, Deserialize)]
struct KonnectPaymentEnvelope {
    payment: KonnectPayment,
}

#[derive(Debug, Deserialize)]
struct KonnectPayment {
    status: String,
}

/// Thin client for the Konnect payment API. It only knows how to talk the
/// wire protocol; deciding what a status means for a transaction is the
/// orchestrator's job.
#[derive(Clone)]
pub struct KonnectClient {
    client: Client,
    config: KonnectConfig,
}

impl KonnectClient {
    pub fn new(config: KonnectConfig) -> AppResult<Self> {
        // A hung gateway must not pin request handlers forever.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl PaymentGateway for KonnectClient {
    async fn create_payment(&self, request: &CreatePaymentRequest) -> AppResult<CreatedPayment> {
        let url = format!("{}/payments/init-payment", self.config.base_url);

        let payload = KonnectInitRequest {
            receiver_wallet_id: self.config.receiver_wallet_id.clone(),
            token: "TND".to_string(),
            amount: request.amount,
            payment_type: "immediate".to_string(),
            description: request.description.clone(),
            accepted_payment_methods: vec![
                "wallet".to_string(),
                "bank_card".to_string(),
                "e-DINAR".to_string(),
            ],
            lifespan: self.config.lifespan_minutes,
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            phone_number: request.phone_number.clone(),
            email: request.email.clone(),
            order_id: request.order_id.clone(),
            webhook: request.webhook_url.clone(),
            silent_webhook: true,
            success_url: request.success_url.clone(),
            fail_url: request.fail_url.clone(),
            theme: "light".to_string(),
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            let body: KonnectInitResponse = response.json().await?;
            Ok(CreatedPayment {
                pay_url: body.pay_url,
                payment_ref: body.payment_ref,
            })
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            Err(AppError::GatewayUnavailable(format!(
                "init-payment returned {status}: {error_text}"
            )))
        }
    }

    async fn get_payment_status(&self, payment_ref: &str) -> AppResult<GatewayPaymentStatus> {
        let url = format!("{}/payments/{}", self.config.base_url, payment_ref);

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.config.api_key)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::PaymentNotFound(payment_ref.to_string()));
        }

        if response.status().is_success() {
            let body: KonnectPaymentEnvelope = response.json().await?;
            Ok(GatewayPaymentStatus::from_gateway(&body.payment.status))
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            Err(AppError::GatewayUnavailable(format!(
                "get-payment returned {status}: {error_text}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> KonnectConfig {
        KonnectConfig {
            base_url: "https://api.sandbox.konnect.network/api/v2".to_string(),
            api_key: "test-key".to_string(),
            receiver_wallet_id: "wallet-123".to_string(),
            timeout_secs: 5,
            lifespan_minutes: 30,
            mode: "live".to_string(),
        }
    }

    #[test]
    fn test_client_creation() {
        let client = KonnectClient::new(test_config());
        assert!(client.is_ok());
    }

    #[test]
    fn test_init_request_wire_format() {
        let payload = KonnectInitRequest {
            receiver_wallet_id: "wallet-123".to_string(),
            token: "TND".to_string(),
            amount: 15000,
            payment_type: "immediate".to_string(),
            description: "Donation".to_string(),
            accepted_payment_methods: vec!["wallet".to_string()],
            lifespan: 30,
            first_name: Some("Amine".to_string()),
            last_name: None,
            phone_number: None,
            email: None,
            order_id: "order-1".to_string(),
            webhook: "https://backend.test/webhook/konnect".to_string(),
            silent_webhook: true,
            success_url: "https://front.test/done".to_string(),
            fail_url: "https://front.test/failed".to_string(),
            theme: "light".to_string(),
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["receiverWalletId"], "wallet-123");
        assert_eq!(json["amount"], 15000);
        assert_eq!(json["type"], "immediate");
        assert_eq!(json["firstName"], "Amine");
        assert_eq!(json["silentWebhook"], true);
        // Unset optional fields stay off the wire entirely.
        assert!(json.get("lastName").is_none());
    }

    #[test]
    fn test_init_response_parsing() {
        let body = r#"{"payUrl":"https://gateway.test/pay/ref_1","paymentRef":"ref_1"}"#;
        let parsed: KonnectInitResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.pay_url, "https://gateway.test/pay/ref_1");
        assert_eq!(parsed.payment_ref, "ref_1");
    }

    #[test]
    fn test_payment_envelope_parsing() {
        let body = r#"{"payment":{"status":"completed","amount":15000,"token":"TND"}}"#;
        let parsed: KonnectPaymentEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(
            GatewayPaymentStatus::from_gateway(&parsed.payment.status),
            GatewayPaymentStatus::Completed
        );
    }
}
