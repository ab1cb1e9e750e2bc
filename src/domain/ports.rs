use super::order::{NewOrder, Order, OrderUpdate};
use super::payment::{CardPayment, PaymentCardPayload, PaymentLinkRequest};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: NewOrder) -> Result<Order>;
    async fn get(&self, order_id: &str) -> Result<Option<Order>>;
    async fn update(&self, order_id: &str, update: OrderUpdate) -> Result<Order>;
}

pub type OrderStoreRef = Arc<dyn OrderStore>;

/// Source of the signed-in user's bearer token.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn access_token(&self) -> Result<Option<String>>;
}

pub type SessionRef = Arc<dyn SessionProvider>;

/// One network path to the payment provider.
///
/// Responses are returned verbatim; `Value::Null` means the path answered
/// without a body.
#[async_trait]
pub trait PaymentTransport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process_card(&self, payment: &CardPayment, token: Option<&str>) -> Result<Value>;

    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
        token: Option<&str>,
    ) -> Result<Value>;

    /// Availability probe. Paths without one report success.
    async fn check(&self, _token: Option<&str>) -> Result<Value> {
        Ok(Value::Null)
    }
}

pub type TransportBox = Box<dyn PaymentTransport>;

/// Invocation of named serverless functions on the hosted backend.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, function: &str, body: &Value, token: &str) -> Result<Value>;
}

pub type FunctionInvokerRef = Arc<dyn FunctionInvoker>;

#[async_trait]
pub trait StaffDirectory: Send + Sync {
    async fn role_of(&self, user_id: &str) -> Result<Option<String>>;
}

/// The provider's payment-card API.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_card(&self, payload: &PaymentCardPayload) -> Result<Value>;
}
