//! Adapters for the hosted backend: the REST row store (`orders`,
//! `staff_members`), serverless function invocation and password auth.

use super::http::{error_message, error_message_from, json_or_null};
use crate::config::BackendConfig;
use crate::domain::auth::{Session, SignUp, User, localize_auth_error};
use crate::domain::order::{NewOrder, Order, OrderUpdate};
use crate::domain::ports::{FunctionInvoker, OrderStore, SessionRef, StaffDirectory};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

const ORDERS_TABLE: &str = "orders";
const STAFF_TABLE: &str = "staff_members";

/// REST and function client for the hosted backend.
///
/// Requests carry the project's anon key as `apikey` and the signed-in user's
/// token as bearer, falling back to the anon key for anonymous calls.
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    config: BackendConfig,
    session: SessionRef,
}

impl SupabaseClient {
    pub fn new(config: BackendConfig, session: SessionRef) -> Self {
        Self {
            http: Client::new(),
            config,
            session,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url, table)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = match self.session.access_token().await? {
            Some(token) => token,
            None => self.config.anon_key.clone(),
        };
        Ok(request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token))
    }

    async fn rows<T: DeserializeOwned>(&self, response: Response, what: &str) -> Result<Vec<T>> {
        let status = response.status();
        let body = json_or_null(response).await?;
        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| status.to_string());
            error!(%status, %message, "{what} failed");
            return Err(PaymentError::Rejected(format!("{what} failed: {message}")));
        }
        Ok(serde_json::from_value(body)?)
    }
}

#[async_trait]
impl OrderStore for SupabaseClient {
    async fn insert(&self, order: NewOrder) -> Result<Order> {
        let request = self
            .http
            .post(self.table_url(ORDERS_TABLE))
            .header("Prefer", "return=representation")
            .json(&[&order]);
        let response = self.authorized(request).await?.send().await?;
        let rows: Vec<Order> = self.rows(response, "order creation").await?;
        let created = rows.into_iter().next().ok_or_else(|| {
            PaymentError::InvalidResponse("order could not be created".to_string())
        })?;
        debug!(order_id = %created.id, "order created");
        Ok(created)
    }

    async fn get(&self, order_id: &str) -> Result<Option<Order>> {
        let request = self
            .http
            .get(self.table_url(ORDERS_TABLE))
            .query(&[("id", format!("eq.{order_id}")), ("select", "*".to_string())]);
        let response = self.authorized(request).await?.send().await?;
        let rows: Vec<Order> = self.rows(response, "order lookup").await?;
        Ok(rows.into_iter().next())
    }

    async fn update(&self, order_id: &str, update: OrderUpdate) -> Result<Order> {
        let request = self
            .http
            .patch(self.table_url(ORDERS_TABLE))
            .query(&[("id", format!("eq.{order_id}"))])
            .header("Prefer", "return=representation")
            .json(&update);
        let response = self.authorized(request).await?.send().await?;
        let rows: Vec<Order> = self.rows(response, "order update").await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| PaymentError::OrderNotFound(order_id.to_string()))
    }
}

#[derive(Deserialize)]
struct StaffRow {
    role: Option<String>,
}

#[async_trait]
impl StaffDirectory for SupabaseClient {
    async fn role_of(&self, user_id: &str) -> Result<Option<String>> {
        let request = self.http.get(self.table_url(STAFF_TABLE)).query(&[
            ("user_id", format!("eq.{user_id}")),
            ("select", "role".to_string()),
        ]);
        let response = self.authorized(request).await?.send().await?;
        let rows: Vec<StaffRow> = self.rows(response, "staff lookup").await?;
        Ok(rows.into_iter().next().and_then(|row| row.role))
    }
}

#[async_trait]
impl FunctionInvoker for SupabaseClient {
    async fn invoke(&self, function: &str, body: &Value, token: &str) -> Result<Value> {
        let url = format!("{}/functions/v1/{}", self.config.url, function);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(function, error = %e, "function request could not be sent");
                PaymentError::Transport(format!(
                    "Failed to send a request to the Edge Function: {e}"
                ))
            })?;

        let status = response.status();
        let body = json_or_null(response).await?;
        if status.is_success() {
            return Ok(body);
        }

        match error_message(&body) {
            Some(message) => {
                warn!(function, %status, %message, "function rejected the request");
                Err(PaymentError::Rejected(message))
            }
            None => {
                warn!(function, %status, "function returned an error status");
                Err(PaymentError::Transport(format!(
                    "Edge Function returned a non-2xx status code ({})",
                    status.as_u16()
                )))
            }
        }
    }
}

/// Password sign-in and sign-up against the hosted auth API.
#[derive(Clone)]
pub struct AuthClient {
    http: Client,
    config: BackendConfig,
}

/// Profile fields stored with a new account.
#[derive(Debug, Clone, Default)]
pub struct SignUpProfile {
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl AuthClient {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .http
            .post(format!("{}/auth/v1/token", self.config.url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let body = Self::checked(response).await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignUpProfile,
    ) -> Result<SignUp> {
        let response = self
            .http
            .post(format!("{}/auth/v1/signup", self.config.url))
            .header("apikey", &self.config.anon_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": {
                    "display_name": profile.name,
                    "phone": profile.phone,
                    "created_at": Utc::now().to_rfc3339(),
                }
            }))
            .send()
            .await?;

        let body = Self::checked(response).await?;
        // Confirmed sign-ups come back as a session, unconfirmed ones as the bare user.
        let user: User = match body.get("user") {
            Some(user) => serde_json::from_value(user.clone())?,
            None => serde_json::from_value(body)?,
        };
        Ok(SignUp {
            needs_email_verification: user.confirmed_at.is_none(),
            user,
        })
    }

    async fn checked(response: Response) -> Result<Value> {
        let status = response.status();
        let body = json_or_null(response).await?;
        if status.is_success() {
            return Ok(body);
        }
        // Auth errors carry a short code in `error` and the readable text elsewhere.
        let message = error_message_from(&body, &["error_description", "msg", "message", "error"])
            .unwrap_or_else(|| status.to_string());
        error!(%status, %message, "authentication request failed");
        Err(PaymentError::Auth(localize_auth_error(&message)))
    }
}
