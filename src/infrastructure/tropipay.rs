use super::http::{error_message, json_or_null};
use crate::config::ProviderConfig;
use crate::domain::payment::{
    DEFAULT_PROVIDER_CURRENCY, PaymentCardPayload, PaymentLinkRequest, SERVICE_PAYMENT_REASON,
};
use crate::domain::ports::PaymentGateway;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use rust_decimal::RoundingStrategy;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::OnceLock;
use tracing::{debug, error, info};

const TOKEN_PATH: &str = "/api/v2/access/token";
const PAYMENT_CARDS_PATH: &str = "/api/v2/paymentcards";

#[derive(Deserialize)]
struct AccessToken {
    access_token: String,
}

/// The provider's REST API, authenticated with OAuth client credentials.
pub struct TropipayApi {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl TropipayApi {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let (client_id, client_secret) = config.credentials()?;
        Ok(Self {
            http: Client::new(),
            base_url: config.api_base().trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, TOKEN_PATH))
            .json(&json!({
                "grant_type": "client_credentials",
                "client_id": self.client_id,
                "client_secret": self.client_secret,
            }))
            .send()
            .await?;
        let token: AccessToken = serde_json::from_value(Self::checked(response).await?)?;
        Ok(token.access_token)
    }

    async fn checked(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = json_or_null(response).await?;
        if status.is_success() {
            Ok(body)
        } else {
            let message = error_message(&body).unwrap_or_else(|| status.to_string());
            Err(PaymentError::Rejected(message))
        }
    }
}

#[async_trait]
impl PaymentGateway for TropipayApi {
    async fn create_payment_card(&self, payload: &PaymentCardPayload) -> Result<Value> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!("{}{}", self.base_url, PAYMENT_CARDS_PATH))
            .bearer_auth(token)
            .json(payload)
            .send()
            .await?;
        Self::checked(response).await
    }
}

/// Creates hosted payment links through a [`PaymentGateway`].
///
/// No retries and no caching: a provider error is logged and returned as-is.
pub struct TropipayService<G = TropipayApi> {
    gateway: G,
}

static SHARED: OnceLock<TropipayService> = OnceLock::new();

impl TropipayService {
    /// Builds a service against the provider API. Fails when either
    /// credential is missing.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let gateway = TropipayApi::new(config).inspect_err(|e| {
            error!(error = %e, "payment provider is not configured");
        })?;
        info!(mode = ?config.mode, "payment provider service initialized");
        Ok(Self { gateway })
    }

    /// The process-wide instance, created on first use.
    pub fn shared(config: &ProviderConfig) -> Result<&'static Self> {
        if let Some(service) = SHARED.get() {
            return Ok(service);
        }
        let service = Self::from_config(config)?;
        // A concurrent first call may have won; either instance is equivalent.
        Ok(SHARED.get_or_init(|| service))
    }
}

impl<G: PaymentGateway> TropipayService<G> {
    pub fn with_gateway(gateway: G) -> Self {
        Self { gateway }
    }

    pub async fn create_payment_link(&self, request: &PaymentLinkRequest) -> Result<Value> {
        let payload = build_payload(request, Utc::now())?;
        debug!(?payload, "payment card payload");

        match self.gateway.create_payment_card(&payload).await {
            Ok(response) => {
                info!(reference = %payload.reference, "payment link created");
                Ok(response)
            }
            Err(e) => {
                error!(reference = %payload.reference, error = %e, "payment link creation failed");
                Err(e)
            }
        }
    }
}

/// Fixed-shape provider request for a single-use, one-day service payment.
pub fn build_payload(request: &PaymentLinkRequest, now: DateTime<Utc>) -> Result<PaymentCardPayload> {
    let amount = request
        .amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| {
            PaymentError::ValidationError(format!("amount {} is out of range", request.amount))
        })?;

    let currency = request
        .currency
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_PROVIDER_CURRENCY)
        .to_string();

    Ok(PaymentCardPayload {
        reference: request.reference.clone(),
        concept: request.concept.clone(),
        description: request.description.clone(),
        currency,
        amount,
        lang: "es".to_string(),
        url_success: request.url_success.clone(),
        url_failed: request.url_failed.clone(),
        url_notification: request.url_notification.clone(),
        client: request.client.clone(),
        direct_payment: true,
        favorite: false,
        single_use: true,
        reason_id: SERVICE_PAYMENT_REASON,
        expiration_days: 1,
        service_date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
