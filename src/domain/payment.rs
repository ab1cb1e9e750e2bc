use super::order::{Order, OrderDraft, PaymentMethod};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Base of the provider's short links, used when a response only carries a hash.
pub const SHORT_URL_BASE: &str = "https://tppay.me";

/// Reason code the provider files service payments under.
pub const SERVICE_PAYMENT_REASON: u32 = 4;

pub const DEFAULT_PROVIDER_CURRENCY: &str = "USD";

/// Card data entered by the payer.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    pub card_number: String,
    pub expiry_date: String,
    pub cvv: String,
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("card_number", &mask(&self.card_number))
            .field("expiry_date", &self.expiry_date)
            .field("cvv", &"***")
            .finish()
    }
}

fn mask(card_number: &str) -> String {
    let digits: Vec<char> = card_number.chars().filter(char::is_ascii_digit).collect();
    let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
    format!("****{tail}")
}

/// Body sent to either transport for a card charge.
#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPayment {
    #[serde(flatten)]
    pub card: CardDetails,
    pub amount: Decimal,
}

impl fmt::Debug for CardPayment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardPayment")
            .field("card", &self.card)
            .field("amount", &self.amount)
            .finish()
    }
}

/// Payer details the provider pre-fills on its hosted page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentClient {
    pub name: String,
    pub last_name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub country_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_and_conditions: Option<String>,
}

/// What the checkout knows about a payment link before the order exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDetails {
    /// Public origin the provider redirects back to.
    pub origin: String,
    pub description: String,
    #[serde(default)]
    pub url_notification: Option<String>,
    #[serde(default)]
    pub client: Option<PaymentClient>,
}

impl LinkDetails {
    /// Binds the link to a persisted order. Amounts go to the provider in cents.
    pub fn for_order(&self, order: &Order) -> Result<PaymentLinkRequest> {
        let short_id: String = order.id.chars().take(8).collect();
        let amount = order
            .amount
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(|| {
                PaymentError::ValidationError(format!("amount {} is out of range", order.amount))
            })?;
        Ok(PaymentLinkRequest {
            reference: order.id.clone(),
            concept: format!("Pedido #{short_id}"),
            amount,
            currency: Some(order.currency.clone()),
            description: self.description.clone(),
            url_success: format!("{}/thank-you?order={}", self.origin, order.id),
            url_failed: format!("{}/payment?order={}", self.origin, order.id),
            url_notification: self.url_notification.clone(),
            client: self.client.clone(),
            favorite: false,
        })
    }
}

/// Body sent to either transport to create a hosted payment link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkRequest {
    pub reference: String,
    pub concept: String,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url_success: String,
    #[serde(default)]
    pub url_failed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_notification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<PaymentClient>,
    #[serde(default)]
    pub favorite: bool,
}

/// Fixed-shape payload the provider's payment-card endpoint accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCardPayload {
    pub reference: String,
    pub concept: String,
    pub description: String,
    pub currency: String,
    pub amount: i64,
    pub lang: String,
    pub url_success: String,
    pub url_failed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_notification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<PaymentClient>,
    pub direct_payment: bool,
    pub favorite: bool,
    pub single_use: bool,
    pub reason_id: u32,
    pub expiration_days: u32,
    pub service_date: String,
}

/// Method-specific data of a payment attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentDetails {
    Card(CardDetails),
    PaymentLink(LinkDetails),
}

impl PaymentDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentDetails::Card(_) => PaymentMethod::Card,
            PaymentDetails::PaymentLink(_) => PaymentMethod::Tropipay,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub order: OrderDraft,
    pub details: PaymentDetails,
}

impl PaymentRequest {
    /// Decodes untyped payment data for a method name.
    ///
    /// Unknown methods are rejected here, before anything is persisted.
    pub fn parse(method: &str, order: OrderDraft, data: Value) -> Result<Self> {
        let details = match method.parse::<PaymentMethod>()? {
            PaymentMethod::Card => PaymentDetails::Card(serde_json::from_value(data)?),
            PaymentMethod::Tropipay => PaymentDetails::PaymentLink(serde_json::from_value(data)?),
        };
        Ok(Self { order, details })
    }

    pub fn method(&self) -> PaymentMethod {
        self.details.method()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
    #[serde(default)]
    pub transaction_id: Option<Value>,
}

impl CardResponse {
    /// The charge reference; numeric ids are kept as their decimal text.
    pub fn reference(&self) -> Option<String> {
        self.transaction_id.as_ref().and_then(id_text)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "_id")]
    pub legacy_id: Option<Value>,
    #[serde(default)]
    pub short_url: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
}

impl PaymentLinkResponse {
    /// The provider's id for the link, whichever field it came in.
    pub fn reference(&self) -> Option<String> {
        self.id
            .as_ref()
            .or(self.legacy_id.as_ref())
            .and_then(id_text)
    }

    /// The payer-facing link, derived from `hash` when `shortUrl` is absent.
    pub fn resolve_short_url(&self) -> Result<String> {
        if let Some(url) = self.short_url.as_deref().filter(|url| !url.is_empty()) {
            return Ok(url.to_string());
        }
        match self.hash.as_deref().filter(|hash| !hash.is_empty()) {
            Some(hash) => Ok(format!("{SHORT_URL_BASE}/{hash}")),
            None => Err(PaymentError::InvalidResponse(
                "could not determine the payment URL".to_string(),
            )),
        }
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The result of a successful payment attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub order_id: String,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    /// Where to send the payer next; only payment links have one.
    pub redirect_url: Option<String>,
    pub response: Value,
}
