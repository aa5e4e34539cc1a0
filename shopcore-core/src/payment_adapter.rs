use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopcore_domain::CryptoCurrency;
use uuid::Uuid;

/// What the external cryptocurrency processor hands back when asked to
/// create a payment address for an order or deposit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorInvoice {
    pub payment_processing_id: String,
    pub payment_address: String,
    pub payment_amount_crypto: Decimal,
    pub expires_at: DateTime<Utc>,
}

/// The single runtime singleton for the outbound payment-processor HTTP
/// client (see the "Global state" design note). Constructor-injected into
/// the payment service, never constructed ad hoc.
#[async_trait]
pub trait PaymentProcessorClient: Send + Sync {
    async fn issue_invoice(
        &self,
        order_id: Uuid,
        fiat_amount: Decimal,
        fiat_currency: &str,
        crypto_currency: CryptoCurrency,
    ) -> Result<ProcessorInvoice, Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Serialize)]
struct IssueInvoiceRequest {
    order_id: Uuid,
    fiat_amount: Decimal,
    fiat_currency: String,
    crypto_currency: CryptoCurrency,
}

#[derive(Deserialize)]
struct IssueInvoiceResponse {
    payment_processing_id: String,
    payment_address: String,
    payment_amount_crypto: Decimal,
    expires_at: DateTime<Utc>,
}

/// Talks to the external cryptocurrency payment processor over HTTPS. The
/// base URL and API key are supplied at construction; every call times out
/// rather than hanging a webhook handler indefinitely.
pub struct HttpPaymentProcessorClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentProcessorClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("reqwest client builder should not fail with default TLS backend");
        Self { http, base_url, api_key }
    }
}

#[async_trait]
impl PaymentProcessorClient for HttpPaymentProcessorClient {
    async fn issue_invoice(
        &self,
        order_id: Uuid,
        fiat_amount: Decimal,
        fiat_currency: &str,
        crypto_currency: CryptoCurrency,
    ) -> Result<ProcessorInvoice, Box<dyn std::error::Error + Send + Sync>> {
        let response = self
            .http
            .post(format!("{}/v1/invoices", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&IssueInvoiceRequest { order_id, fiat_amount, fiat_currency: fiat_currency.to_string(), crypto_currency })
            .send()
            .await?
            .error_for_status()?
            .json::<IssueInvoiceResponse>()
            .await?;

        Ok(ProcessorInvoice {
            payment_processing_id: response.payment_processing_id,
            payment_address: response.payment_address,
            payment_amount_crypto: response.payment_amount_crypto,
            expires_at: response.expires_at,
        })
    }
}
