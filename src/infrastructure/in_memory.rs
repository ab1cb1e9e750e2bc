use crate::domain::order::{NewOrder, Order, OrderUpdate};
use crate::domain::ports::{OrderStore, SessionProvider, StaffDirectory};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory order table.
///
/// Uses `Arc<RwLock<HashMap<String, Order>>>` so clones share the same rows.
/// Used when no hosted backend is configured, and in tests.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<String, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<Order> {
        let order = order.into_order(Uuid::new_v4().to_string());
        let mut orders = self.orders.write().await;
        orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn get(&self, order_id: &str) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(order_id).cloned())
    }

    async fn update(&self, order_id: &str, update: OrderUpdate) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| PaymentError::OrderNotFound(order_id.to_string()))?;
        order.apply(update);
        Ok(order.clone())
    }
}

/// Staff roles keyed by user id.
#[derive(Default, Clone)]
pub struct InMemoryStaffDirectory {
    roles: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStaffDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn assign(&self, user_id: &str, role: &str) {
        let mut roles = self.roles.write().await;
        roles.insert(user_id.to_string(), role.to_string());
    }
}

#[async_trait]
impl StaffDirectory for InMemoryStaffDirectory {
    async fn role_of(&self, user_id: &str) -> Result<Option<String>> {
        let roles = self.roles.read().await;
        Ok(roles.get(user_id).cloned())
    }
}

/// A fixed bearer token, or none at all.
#[derive(Debug, Default, Clone)]
pub struct StaticSession {
    token: Option<String>,
}

impl StaticSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn access_token(&self) -> Result<Option<String>> {
        Ok(self.token.clone())
    }
}
