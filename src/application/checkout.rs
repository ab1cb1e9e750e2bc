use super::orchestrator::PaymentOrchestrator;
use crate::domain::auth::User;
use crate::domain::meal::prepare_meals;
use crate::domain::order::{OrderDraft, OrderSummary};
use crate::domain::payment::{
    CardDetails, LinkDetails, PaymentClient, PaymentDetails, PaymentOutcome, PaymentRequest,
};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

pub const CHECKOUT_CURRENCY: &str = "EUR";

/// Country the provider's client form is pre-filled with.
const DEFAULT_COUNTRY_ID: u32 = 1;

/// The payer's choice on the checkout form.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutPayment {
    Card(CardDetails),
    Tropipay,
}

/// The checkout form's submit handler.
///
/// Validates the cart, builds the order and hands it to the orchestrator.
/// Only one submission runs at a time; a second one is turned away.
pub struct CheckoutService {
    orchestrator: PaymentOrchestrator,
    busy: AtomicBool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CheckoutService {
    pub fn new(orchestrator: PaymentOrchestrator) -> Self {
        Self {
            orchestrator,
            busy: AtomicBool::new(false),
        }
    }

    pub fn orchestrator(&self) -> &PaymentOrchestrator {
        &self.orchestrator
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Runs one checkout submission.
    ///
    /// `origin` is the public address the payer returns to after paying by link.
    pub async fn submit(
        &self,
        summary: &OrderSummary,
        payment: CheckoutPayment,
        user: &User,
        origin: &str,
    ) -> Result<PaymentOutcome> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PaymentError::PaymentInProgress);
        }
        let _guard = BusyGuard(&self.busy);

        let result = self.run(summary, payment, user, origin).await;
        if let Err(e) = &result {
            error!(user_id = %user.id, error = %e, "checkout failed");
        }
        result
    }

    async fn run(
        &self,
        summary: &OrderSummary,
        payment: CheckoutPayment,
        user: &User,
        origin: &str,
    ) -> Result<PaymentOutcome> {
        let draft = build_draft(summary, user)?;
        info!(
            user_id = %user.id,
            meals = draft.meals.len(),
            package_id = %draft.package.id,
            "submitting checkout"
        );

        let details = match payment {
            CheckoutPayment::Card(card) => PaymentDetails::Card(card),
            CheckoutPayment::Tropipay => PaymentDetails::PaymentLink(LinkDetails {
                origin: origin.trim_end_matches('/').to_string(),
                description: format!("{} - {} comidas", draft.package.name, draft.meals.len()),
                url_notification: None,
                client: Some(payment_client(user, summary)),
            }),
        };

        self.orchestrator
            .process_payment(PaymentRequest {
                order: draft,
                details,
            })
            .await
    }
}

/// Validates a cart summary into an order draft. No network calls.
pub fn build_draft(summary: &OrderSummary, user: &User) -> Result<OrderDraft> {
    let selections = summary
        .selected_meals
        .as_deref()
        .ok_or_else(|| PaymentError::ValidationError("no meals selected".to_string()))?;
    let package = summary
        .package
        .clone()
        .ok_or_else(|| PaymentError::ValidationError("no package selected".to_string()))?;
    let delivery_address = summary
        .delivery_address
        .clone()
        .ok_or_else(|| PaymentError::ValidationError("no delivery address selected".to_string()))?;

    let meals = prepare_meals(selections)?;

    Ok(OrderDraft {
        user_id: user.id.clone(),
        amount: package.price.unwrap_or(Decimal::ZERO),
        package,
        meals,
        delivery_address,
        personal_note: summary.personal_note.clone().unwrap_or_default(),
        currency: CHECKOUT_CURRENCY.to_string(),
    })
}

fn payment_client(user: &User, summary: &OrderSummary) -> PaymentClient {
    let (name, last_name) = user.name_parts();
    PaymentClient {
        name,
        last_name,
        address: summary
            .delivery_address
            .as_ref()
            .map(|address| address.address.clone())
            .unwrap_or_default(),
        phone: user.user_metadata.phone.clone().unwrap_or_default(),
        email: user.email.clone().unwrap_or_default(),
        country_id: DEFAULT_COUNTRY_ID,
        terms_and_conditions: Some("true".to_string()),
    }
}
