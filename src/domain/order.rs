use super::meal::{Meal, MealSelection};
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => f.write_str("pending"),
            OrderStatus::Completed => f.write_str("completed"),
            OrderStatus::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Tropipay,
}

impl FromStr for PaymentMethod {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "card" => Ok(PaymentMethod::Card),
            "tropipay" => Ok(PaymentMethod::Tropipay),
            _ => Err(PaymentError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Card => f.write_str("card"),
            PaymentMethod::Tropipay => f.write_str("tropipay"),
        }
    }
}

/// The meal package a customer picked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub recipient_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub municipality: String,
}

/// What the cart hands over to checkout. Every part is optional here because
/// the cart may be stale or incomplete; checkout rejects what is missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    #[serde(default)]
    pub package: Option<Package>,
    #[serde(default)]
    pub selected_meals: Option<Vec<MealSelection>>,
    #[serde(default)]
    pub delivery_address: Option<DeliveryAddress>,
    #[serde(default)]
    pub personal_note: Option<String>,
}

/// A validated order that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub user_id: String,
    pub package: Package,
    pub meals: Vec<Meal>,
    pub delivery_address: DeliveryAddress,
    pub personal_note: String,
    pub amount: Decimal,
    pub currency: String,
}

/// Insert payload for the `orders` table; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrder {
    pub user_id: String,
    pub package_id: String,
    #[serde(rename = "package_data")]
    pub package: Package,
    pub meals: Vec<Meal>,
    pub delivery_address_id: String,
    #[serde(rename = "delivery_address_data")]
    pub delivery_address: DeliveryAddress,
    pub personal_note: String,
    #[serde(rename = "total")]
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn pending(draft: OrderDraft, method: PaymentMethod) -> Self {
        Self {
            user_id: draft.user_id,
            package_id: draft.package.id.clone(),
            package: draft.package,
            meals: draft.meals,
            delivery_address_id: draft.delivery_address.id.clone(),
            delivery_address: draft.delivery_address,
            personal_note: draft.personal_note,
            amount: draft.amount,
            currency: draft.currency,
            payment_method: method,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn into_order(self, id: String) -> Order {
        Order {
            id,
            user_id: self.user_id,
            package_id: self.package_id,
            package: self.package,
            meals: self.meals,
            delivery_address_id: self.delivery_address_id,
            delivery_address: self.delivery_address,
            personal_note: self.personal_note,
            amount: self.amount,
            currency: self.currency,
            payment_method: self.payment_method,
            status: self.status,
            reference: None,
            short_url: None,
            error_message: None,
            created_at: self.created_at,
            completed_at: None,
        }
    }
}

/// A persisted checkout transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub package_id: String,
    #[serde(rename = "package_data")]
    pub package: Package,
    pub meals: Vec<Meal>,
    pub delivery_address_id: String,
    #[serde(rename = "delivery_address_data")]
    pub delivery_address: DeliveryAddress,
    #[serde(default)]
    pub personal_note: String,
    #[serde(rename = "total")]
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub short_url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Applies a partial update; fields left as `None` are untouched.
    pub fn apply(&mut self, update: OrderUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(method) = update.payment_method {
            self.payment_method = method;
        }
        if update.reference.is_some() {
            self.reference = update.reference;
        }
        if update.short_url.is_some() {
            self.short_url = update.short_url;
        }
        if let Some(message) = update.error_message {
            self.error_message = message;
        }
        if update.completed_at.is_some() {
            self.completed_at = update.completed_at;
        }
    }
}

/// A single-row patch. Serialized as-is for REST `PATCH` requests, so absent
/// fields are skipped rather than nulled. `error_message: Some(None)` clears
/// the column.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct OrderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl OrderUpdate {
    /// Puts a previously failed order back in play for another attempt.
    pub fn retry(method: PaymentMethod) -> Self {
        Self {
            status: Some(OrderStatus::Pending),
            payment_method: Some(method),
            error_message: Some(None),
            ..Self::default()
        }
    }

    pub fn completed(reference: Option<String>, short_url: Option<String>) -> Self {
        Self {
            status: Some(OrderStatus::Completed),
            reference,
            short_url,
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn failed(message: &str) -> Self {
        let message = if message.trim().is_empty() {
            "Payment processing failed"
        } else {
            message
        };
        Self {
            status: Some(OrderStatus::Failed),
            error_message: Some(Some(message.to_string())),
            ..Self::default()
        }
    }
}
