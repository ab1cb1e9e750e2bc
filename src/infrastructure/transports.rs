//! The two network paths to the payment provider: the hosted serverless
//! function (primary) and the application server's payment endpoints
//! (fallback).

use super::http::{error_message, json_or_null};
use crate::domain::payment::{CardPayment, PaymentLinkRequest};
use crate::domain::ports::{FunctionInvokerRef, PaymentTransport};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

pub const PAYMENT_FUNCTION: &str = "tropipay-payment";

pub const PROCESS_CARD_PATH: &str = "/api/payments/process-card";
pub const CREATE_PAYMENT_LINK_PATH: &str = "/api/payments/create-payment-link";

/// Serializes `payload` and tags it with the function `action`.
fn with_action<T: Serialize>(action: &str, payload: &T) -> Result<Value> {
    let mut body = serde_json::to_value(payload)?;
    match body.as_object_mut() {
        Some(map) => {
            map.insert("action".to_string(), Value::String(action.to_string()));
            Ok(body)
        }
        None => Ok(json!({ "action": action, "payload": body })),
    }
}

/// Reaches the provider through the `tropipay-payment` serverless function.
pub struct EdgeFunctionTransport {
    functions: FunctionInvokerRef,
}

impl EdgeFunctionTransport {
    pub fn new(functions: FunctionInvokerRef) -> Self {
        Self { functions }
    }

    async fn call(&self, body: Value, token: Option<&str>) -> Result<Value> {
        let token = token.ok_or_else(|| {
            PaymentError::Transport(
                "Failed to send a request to the Edge Function: no access token".to_string(),
            )
        })?;
        self.functions.invoke(PAYMENT_FUNCTION, &body, token).await
    }
}

#[async_trait]
impl PaymentTransport for EdgeFunctionTransport {
    fn name(&self) -> &'static str {
        "edge-function"
    }

    async fn process_card(&self, payment: &CardPayment, token: Option<&str>) -> Result<Value> {
        self.call(with_action("process-card", payment)?, token).await
    }

    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
        token: Option<&str>,
    ) -> Result<Value> {
        self.call(with_action("create-payment-link", request)?, token)
            .await
    }

    async fn check(&self, token: Option<&str>) -> Result<Value> {
        self.call(json!({ "action": "check" }), token).await
    }
}

/// Reaches the provider through the application server's REST endpoints.
pub struct AppServerTransport {
    http: Client,
    base_url: String,
}

impl AppServerTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<T: Serialize + Sync>(
        &self,
        path: &str,
        payload: &T,
        default_error: &str,
        token: Option<&str>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "posting to application server");

        let mut request = self.http.post(&url).json(payload);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| {
            warn!(%url, error = %e, "application server unreachable");
            PaymentError::Transport(format!("payment server unreachable: {e}"))
        })?;

        let status = response.status();
        let body = json_or_null(response).await?;
        if status.is_success() {
            return Ok(body);
        }

        let message = error_message(&body).unwrap_or_else(|| default_error.to_string());
        warn!(%url, %status, %message, "application server rejected the payment");
        Err(PaymentError::Rejected(message))
    }
}

#[async_trait]
impl PaymentTransport for AppServerTransport {
    fn name(&self) -> &'static str {
        "app-server"
    }

    async fn process_card(&self, payment: &CardPayment, token: Option<&str>) -> Result<Value> {
        self.post(PROCESS_CARD_PATH, payment, "Error processing the payment", token)
            .await
    }

    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
        token: Option<&str>,
    ) -> Result<Value> {
        self.post(
            CREATE_PAYMENT_LINK_PATH,
            request,
            "Error creating the payment link",
            token,
        )
        .await
    }
}
