//! Storefront → payment service client.

use reqwest::Client;
use url::Url;

use super::ClientError;
use crate::objects::{CheckPaymentStatusRequest, PaymentResponse, VerifyPaymentRequest};

/// Typed HTTP client for the verify and recovery endpoints.
///
/// Failure envelopes (`success: false`) are returned as `Ok` because they
/// carry a machine-readable reason the caller is expected to inspect.
#[derive(Debug, Clone)]
pub struct PaymentServiceClient {
    http: Client,
    base_url: Url,
}

impl PaymentServiceClient {
    /// Create a new client rooted at `base_url` (e.g. `https://pay.example.com`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /verify-payment`
    pub async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<PaymentResponse, ClientError> {
        let url = self.base_url.join("/verify-payment")?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_envelope(resp).await
    }

    /// `POST /check-payment-status`
    pub async fn check_payment_status(
        &self,
        request: &CheckPaymentStatusRequest,
    ) -> Result<PaymentResponse, ClientError> {
        let url = self.base_url.join("/check-payment-status")?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_envelope(resp).await
    }
}

async fn parse_envelope(resp: reqwest::Response) -> Result<PaymentResponse, ClientError> {
    let status = resp.status();
    let bytes = resp.bytes().await?;
    match serde_json::from_slice::<PaymentResponse>(&bytes) {
        Ok(envelope) => Ok(envelope),
        Err(_) if !status.is_success() => Err(ClientError::Api {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }),
        Err(e) => Err(ClientError::Json(e)),
    }
}
