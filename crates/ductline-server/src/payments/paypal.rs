//! PayPal REST v1 payments client.
//!
//! Uses the client-credentials OAuth flow for an access token, then the
//! classic `/v1/payments/payment` create and execute endpoints.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use ductline_core::config::PaymentsConfig;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use super::gateway::{CaptureOutcome, CheckoutOrder, CreatedPayment, PaymentGateway};
use super::money::format_cents;
use super::PaymentError;

/// Refresh the token this long before the processor says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Connection settings for the PayPal REST API.
#[derive(Debug, Clone)]
pub struct PayPalConfig {
    /// API base URL (e.g. `https://api-m.sandbox.paypal.com`).
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout: Duration,
}

impl From<&PaymentsConfig> for PayPalConfig {
    fn from(config: &PaymentsConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
        }
    }
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

/// PayPal REST API client.
#[derive(Debug)]
pub struct PayPalClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl PayPalClient {
    /// Create a new PayPal client.
    pub fn new(config: &PayPalConfig) -> Result<Self, PaymentError> {
        if config.base_url.is_empty() {
            return Err(PaymentError::Config("base_url is empty".into()));
        }
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(PaymentError::Config(
                "client_id and client_secret are required".into(),
            ));
        }

        // reqwest is built with rustls-no-provider; Err means already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token: Mutex::new(None),
        })
    }

    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success response into [`PaymentError::Api`], keeping the
    /// processor's own message when the body carries one.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, PaymentError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let fallback = status.canonical_reason().unwrap_or("Unknown").to_string();
        let message = match resp.json::<ApiErrorBody>().await {
            Ok(body) if !body.message.is_empty() => format!("{}: {}", body.name, body.message),
            _ => fallback,
        };
        Err(PaymentError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Return a cached access token, fetching a new one when it is missing
    /// or about to expire.
    async fn access_token(&self) -> Result<String, PaymentError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let resp = self
            .http
            .post(self.api_url("/v1/oauth2/token"))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;
        let body: TokenResponse = Self::check_status(resp).await?.json().await?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        debug!(expires_in = body.expires_in, "PayPal access token refreshed");
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(body.access_token)
    }
}

#[async_trait]
impl PaymentGateway for PayPalClient {
    async fn create_payment(
        &self,
        order: &CheckoutOrder<'_>,
    ) -> Result<CreatedPayment, PaymentError> {
        let token = self.access_token().await?;
        let body = json!({
            "intent": "sale",
            "payer": { "payment_method": "paypal" },
            "transactions": [{
                "amount": {
                    "total": format_cents(order.amount_cents),
                    "currency": order.currency,
                },
                "description": order.description,
            }],
            "redirect_urls": {
                "return_url": order.return_url,
                "cancel_url": order.cancel_url,
            },
        });

        let resp = self
            .http
            .post(self.api_url("/v1/payments/payment"))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let payment: PaymentResponse = Self::check_status(resp).await?.json().await?;

        let approval_url = payment
            .links
            .into_iter()
            .find(|link| link.rel == "approval_url")
            .map(|link| link.href)
            .ok_or_else(|| PaymentError::Response("no approval_url link in payment".into()))?;

        debug!(payment_id = %payment.id, state = %payment.state, "PayPal payment created");
        Ok(CreatedPayment {
            payment_id: payment.id,
            approval_url,
        })
    }

    async fn capture_payment(
        &self,
        payment_id: &str,
        payer_ref: &str,
    ) -> Result<CaptureOutcome, PaymentError> {
        if payment_id.is_empty()
            || !payment_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(PaymentError::Config(format!(
                "invalid payment id: {payment_id:?}"
            )));
        }

        let token = self.access_token().await?;
        let resp = self
            .http
            .post(self.api_url(&format!("/v1/payments/payment/{payment_id}/execute")))
            .bearer_auth(&token)
            .json(&json!({ "payer_id": payer_ref }))
            .send()
            .await?;
        let payment: PaymentResponse = Self::check_status(resp).await?.json().await?;

        let completed = matches!(payment.state.as_str(), "approved" | "completed");
        debug!(payment_id = %payment.id, state = %payment.state, completed, "PayPal payment executed");
        Ok(CaptureOutcome {
            completed,
            state: payment.state,
        })
    }
}
