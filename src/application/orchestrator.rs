use crate::domain::order::{NewOrder, Order, OrderDraft, OrderUpdate, PaymentMethod};
use crate::domain::payment::{
    CardDetails, CardPayment, CardResponse, LinkDetails, PaymentDetails, PaymentLinkRequest,
    PaymentLinkResponse, PaymentOutcome, PaymentRequest,
};
use crate::domain::ports::{OrderStoreRef, PaymentTransport, SessionRef, TransportBox};
use crate::error::{PaymentError, Result};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Session-wide switch that routes every payment to the fallback transport
/// once the primary one has been found unreachable.
///
/// Clones share the same state. There is no way to switch it back off.
#[derive(Debug, Clone, Default)]
pub struct FallbackSwitch(Arc<AtomicBool>);

impl FallbackSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_engaged(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns `true` if this call flipped the switch.
    pub fn engage(&self) -> bool {
        !self.0.swap(true, Ordering::Relaxed)
    }
}

/// A request in transport-neutral form.
#[derive(Clone, Copy)]
enum Call<'a> {
    Card(&'a CardPayment),
    Link(&'a PaymentLinkRequest),
}

impl Call<'_> {
    async fn send(&self, transport: &dyn PaymentTransport, token: Option<&str>) -> Result<Value> {
        match self {
            Call::Card(payment) => transport.process_card(payment, token).await,
            Call::Link(request) => transport.create_payment_link(request, token).await,
        }
    }
}

/// Drives a payment attempt from order creation to the final order status.
///
/// Each attempt persists (or reuses) a pending order, sends the payment
/// through the primary transport when it can, falls back to the secondary
/// transport when the primary is unreachable, and records the result on the
/// order. An order is never left `pending` once an attempt returns.
pub struct PaymentOrchestrator {
    orders: OrderStoreRef,
    session: SessionRef,
    primary: Option<TransportBox>,
    fallback: TransportBox,
    switch: FallbackSwitch,
    in_flight: Mutex<Option<String>>,
}

impl PaymentOrchestrator {
    /// Creates an orchestrator that only knows the fallback transport.
    ///
    /// # Arguments
    ///
    /// * `orders` - Where orders are persisted.
    /// * `session` - Supplies the bearer token the primary transport needs.
    /// * `fallback` - The transport used when the primary is absent or unreachable.
    /// * `switch` - Session state shared with whoever else needs to observe it.
    pub fn new(
        orders: OrderStoreRef,
        session: SessionRef,
        fallback: TransportBox,
        switch: FallbackSwitch,
    ) -> Self {
        Self {
            orders,
            session,
            primary: None,
            fallback,
            switch,
            in_flight: Mutex::new(None),
        }
    }

    pub fn with_primary(mut self, primary: TransportBox) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn fallback_switch(&self) -> &FallbackSwitch {
        &self.switch
    }

    /// Id of the order a failed attempt left behind, if any.
    pub async fn in_flight_order(&self) -> Option<String> {
        self.in_flight.lock().await.clone()
    }

    pub async fn order(&self, order_id: &str) -> Result<Option<Order>> {
        self.orders.get(order_id).await
    }

    /// Checks whether the primary transport answers at all; engages the
    /// fallback switch when it does not.
    pub async fn probe_primary(&self) -> bool {
        let Some(primary) = self.primary.as_deref() else {
            return false;
        };
        if self.switch.is_engaged() {
            return false;
        }

        let token = self.token().await;
        let Some(token) = token else {
            warn!("no user session, payments will use the fallback transport");
            self.switch.engage();
            return false;
        };

        match primary.check(Some(&token)).await {
            Ok(_) => {
                info!(transport = primary.name(), "primary payment transport available");
                true
            }
            Err(e) => {
                warn!(transport = primary.name(), error = %e, "primary payment transport unavailable");
                self.switch.engage();
                false
            }
        }
    }

    /// Dispatches on the payment method and runs the matching flow.
    pub async fn process_payment(&self, request: PaymentRequest) -> Result<PaymentOutcome> {
        let method = request.method();
        let order = self.open_order(request.order, method).await?;
        info!(order_id = %order.id, %method, "processing payment");

        let attempt = match &request.details {
            PaymentDetails::Card(card) => self.charge_card(&order, card).await,
            PaymentDetails::PaymentLink(details) => self.create_link(&order, details).await,
        };

        let result = match attempt {
            Ok(outcome) => self
                .orders
                .update(
                    &order.id,
                    OrderUpdate::completed(outcome.reference.clone(), outcome.redirect_url.clone()),
                )
                .await
                .map(|_| outcome),
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                info!(order_id = %order.id, reference = ?outcome.reference, "payment completed");
                *self.in_flight.lock().await = None;
                Ok(outcome)
            }
            Err(e) => {
                error!(order_id = %order.id, %method, error = %e, "payment failed");
                if let Err(update_err) = self
                    .orders
                    .update(&order.id, OrderUpdate::failed(&e.to_string()))
                    .await
                {
                    error!(order_id = %order.id, error = %update_err, "could not mark order as failed");
                }
                Err(e)
            }
        }
    }

    /// Persists a pending order, or reuses the one a failed attempt left.
    async fn open_order(&self, draft: OrderDraft, method: PaymentMethod) -> Result<Order> {
        let mut in_flight = self.in_flight.lock().await;

        if let Some(order_id) = in_flight.as_deref()
            && self.orders.get(order_id).await?.is_some()
        {
            info!(%order_id, "retrying payment for existing order");
            return self.orders.update(order_id, OrderUpdate::retry(method)).await;
        }

        let order = self
            .orders
            .insert(NewOrder::pending(draft, method))
            .await
            .inspect_err(|e| error!(error = %e, "order creation failed"))?;
        *in_flight = Some(order.id.clone());
        Ok(order)
    }

    async fn charge_card(&self, order: &Order, card: &CardDetails) -> Result<PaymentOutcome> {
        let payment = CardPayment {
            card: card.clone(),
            amount: order.amount,
        };
        let response = self.send(Call::Card(&payment)).await?;
        if response.is_null() {
            return Err(no_response());
        }

        // An accepted charge stays accepted even when its reference is unreadable.
        let reference = serde_json::from_value::<CardResponse>(response.clone())
            .ok()
            .and_then(|card_response| card_response.reference());
        Ok(PaymentOutcome {
            order_id: order.id.clone(),
            method: PaymentMethod::Card,
            reference,
            redirect_url: None,
            response,
        })
    }

    async fn create_link(&self, order: &Order, details: &LinkDetails) -> Result<PaymentOutcome> {
        let request = details.for_order(order)?;
        let mut response = self.send(Call::Link(&request)).await?;
        if response.is_null() {
            return Err(no_response());
        }

        let link: PaymentLinkResponse = serde_json::from_value(response.clone())?;
        let short_url = link.resolve_short_url()?;
        if let Some(map) = response.as_object_mut() {
            map.insert("shortUrl".to_string(), Value::String(short_url.clone()));
        }

        Ok(PaymentOutcome {
            order_id: order.id.clone(),
            method: PaymentMethod::Tropipay,
            reference: link.reference(),
            redirect_url: Some(short_url),
            response,
        })
    }

    /// Sends through the primary transport when possible, otherwise (or
    /// after the primary proves unreachable) through the fallback.
    async fn send(&self, call: Call<'_>) -> Result<Value> {
        if let Some(primary) = self.primary.as_deref()
            && !self.switch.is_engaged()
        {
            match self.token().await {
                Some(token) => {
                    info!(transport = primary.name(), "sending payment");
                    match call.send(primary, Some(&token)).await {
                        Ok(response) => return Ok(response),
                        Err(e) if e.is_unreachable() => {
                            warn!(
                                transport = primary.name(),
                                error = %e,
                                "primary transport unreachable, switching to fallback"
                            );
                            self.switch.engage();
                        }
                        Err(e) => return Err(e),
                    }
                }
                None => warn!("no user session, using fallback transport"),
            }
        }

        info!(transport = self.fallback.name(), "sending payment");
        call.send(&*self.fallback, None).await
    }

    async fn token(&self) -> Option<String> {
        match self.session.access_token().await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "could not read the user session");
                None
            }
        }
    }
}

fn no_response() -> PaymentError {
    PaymentError::InvalidResponse("no response received from the payment server".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{DeliveryAddress, OrderStatus, Package};
    use crate::domain::ports::OrderStore;
    use crate::infrastructure::in_memory::{InMemoryOrderStore, StaticSession};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    /// Replays scripted responses and counts calls.
    struct ScriptedTransport {
        name: &'static str,
        responses: StdMutex<Vec<Result<Value>>>,
        calls: Arc<StdMutex<Vec<Option<String>>>>,
    }

    impl ScriptedTransport {
        fn new(name: &'static str, responses: Vec<Result<Value>>) -> (Self, Arc<StdMutex<Vec<Option<String>>>>) {
            let calls = Arc::new(StdMutex::new(Vec::new()));
            let transport = Self {
                name,
                responses: StdMutex::new(responses),
                calls: calls.clone(),
            };
            (transport, calls)
        }

        fn next(&self, token: Option<&str>) -> Result<Value> {
            self.calls.lock().unwrap().push(token.map(str::to_owned));
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(Value::Null)
            } else {
                responses.remove(0)
            }
        }
    }

    #[async_trait]
    impl PaymentTransport for ScriptedTransport {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn process_card(&self, _payment: &CardPayment, token: Option<&str>) -> Result<Value> {
            self.next(token)
        }

        async fn create_payment_link(
            &self,
            _request: &PaymentLinkRequest,
            token: Option<&str>,
        ) -> Result<Value> {
            self.next(token)
        }
    }

    fn draft() -> OrderDraft {
        OrderDraft {
            user_id: "u1".into(),
            package: Package {
                id: "p1".into(),
                name: "Semanal".into(),
                price: Some(dec!(2500)),
                extra: Default::default(),
            },
            meals: vec![],
            delivery_address: DeliveryAddress::default(),
            personal_note: String::new(),
            amount: dec!(2500),
            currency: "EUR".into(),
        }
    }

    fn card_request() -> PaymentRequest {
        PaymentRequest {
            order: draft(),
            details: PaymentDetails::Card(CardDetails {
                card_number: "4111111111111111".into(),
                expiry_date: "12/30".into(),
                cvv: "123".into(),
            }),
        }
    }

    fn link_request() -> PaymentRequest {
        PaymentRequest {
            order: draft(),
            details: PaymentDetails::PaymentLink(LinkDetails {
                origin: "https://shop".into(),
                description: "Semanal - 0 comidas".into(),
                url_notification: None,
                client: None,
            }),
        }
    }

    #[test]
    fn test_switch_engages_once() {
        let switch = FallbackSwitch::new();
        let observer = switch.clone();
        assert!(!observer.is_engaged());
        assert!(switch.engage());
        assert!(!switch.engage());
        assert!(observer.is_engaged());
    }

    #[tokio::test]
    async fn test_card_without_primary_uses_fallback() {
        let store = InMemoryOrderStore::new();
        let (fallback, fallback_calls) =
            ScriptedTransport::new("fallback", vec![Ok(json!({ "transactionId": "t7" }))]);
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(StaticSession::new("tok")),
            Box::new(fallback),
            FallbackSwitch::new(),
        );

        let outcome = orchestrator.process_payment(card_request()).await.unwrap();

        assert_eq!(outcome.reference.as_deref(), Some("t7"));
        assert_eq!(fallback_calls.lock().unwrap().len(), 1);
        let order = store.get(&outcome.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(orchestrator.in_flight_order().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_session_skips_primary_without_engaging_switch() {
        let (primary, primary_calls) = ScriptedTransport::new("primary", vec![]);
        let (fallback, fallback_calls) =
            ScriptedTransport::new("fallback", vec![Ok(json!({ "transactionId": "t1" }))]);
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(StaticSession::anonymous()),
            Box::new(fallback),
            FallbackSwitch::new(),
        )
        .with_primary(Box::new(primary));

        orchestrator.process_payment(card_request()).await.unwrap();

        assert!(primary_calls.lock().unwrap().is_empty());
        assert_eq!(fallback_calls.lock().unwrap().len(), 1);
        assert!(!orchestrator.fallback_switch().is_engaged());
    }

    #[tokio::test]
    async fn test_business_rejection_is_not_retried() {
        let store = InMemoryOrderStore::new();
        let (primary, _) = ScriptedTransport::new(
            "primary",
            vec![Err(PaymentError::Rejected("Card declined".into()))],
        );
        let (fallback, fallback_calls) = ScriptedTransport::new("fallback", vec![]);
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(StaticSession::new("tok")),
            Box::new(fallback),
            FallbackSwitch::new(),
        )
        .with_primary(Box::new(primary));

        let err = orchestrator.process_payment(card_request()).await.unwrap_err();

        assert!(matches!(err, PaymentError::Rejected(_)));
        assert!(fallback_calls.lock().unwrap().is_empty());
        assert!(!orchestrator.fallback_switch().is_engaged());

        let order_id = orchestrator.in_flight_order().await.unwrap();
        let order = store.get(&order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.error_message.as_deref(), Some("Card declined"));
    }

    #[tokio::test]
    async fn test_retry_reuses_in_flight_order() {
        let store = InMemoryOrderStore::new();
        let (fallback, _) = ScriptedTransport::new(
            "fallback",
            vec![
                Err(PaymentError::Rejected("Insufficient funds".into())),
                Ok(json!({ "transactionId": "t2" })),
            ],
        );
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(StaticSession::anonymous()),
            Box::new(fallback),
            FallbackSwitch::new(),
        );

        orchestrator.process_payment(card_request()).await.unwrap_err();
        let first_id = orchestrator.in_flight_order().await.unwrap();

        let outcome = orchestrator.process_payment(card_request()).await.unwrap();

        assert_eq!(outcome.order_id, first_id);
        assert_eq!(store.len().await, 1);
        let order = store.get(&first_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.reference.as_deref(), Some("t2"));
        assert_eq!(order.error_message, None);
    }

    #[tokio::test]
    async fn test_empty_response_fails_order() {
        let store = InMemoryOrderStore::new();
        let (fallback, _) = ScriptedTransport::new("fallback", vec![Ok(Value::Null)]);
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(StaticSession::anonymous()),
            Box::new(fallback),
            FallbackSwitch::new(),
        );

        let err = orchestrator.process_payment(card_request()).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidResponse(_)));

        let order_id = orchestrator.in_flight_order().await.unwrap();
        let order = store.get(&order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn test_link_derives_short_url_from_hash() {
        let store = InMemoryOrderStore::new();
        let (fallback, _) =
            ScriptedTransport::new("fallback", vec![Ok(json!({ "id": "pc-1", "hash": "abc123" }))]);
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(StaticSession::anonymous()),
            Box::new(fallback),
            FallbackSwitch::new(),
        );

        let outcome = orchestrator.process_payment(link_request()).await.unwrap();

        assert_eq!(outcome.redirect_url.as_deref(), Some("https://tppay.me/abc123"));
        assert_eq!(outcome.response["shortUrl"], "https://tppay.me/abc123");
        let order = store.get(&outcome.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.reference.as_deref(), Some("pc-1"));
        assert_eq!(order.short_url.as_deref(), Some("https://tppay.me/abc123"));
    }

    #[tokio::test]
    async fn test_link_without_url_fails_order() {
        let store = InMemoryOrderStore::new();
        let (fallback, _) = ScriptedTransport::new("fallback", vec![Ok(json!({ "id": "pc-1" }))]);
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(StaticSession::anonymous()),
            Box::new(fallback),
            FallbackSwitch::new(),
        );

        let err = orchestrator.process_payment(link_request()).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidResponse(_)));

        let order_id = orchestrator.in_flight_order().await.unwrap();
        let order = store.get(&order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert!(!order.error_message.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_probe_engages_switch_on_failure() {
        let (primary, _) = ScriptedTransport::new("primary", vec![]);
        let (fallback, _) = ScriptedTransport::new("fallback", vec![]);

        // ScriptedTransport keeps the default `check`, which always succeeds.
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(StaticSession::new("tok")),
            Box::new(fallback),
            FallbackSwitch::new(),
        )
        .with_primary(Box::new(primary));
        assert!(orchestrator.probe_primary().await);
        assert!(!orchestrator.fallback_switch().is_engaged());

        let (primary, _) = ScriptedTransport::new("primary", vec![]);
        let (fallback, _) = ScriptedTransport::new("fallback", vec![]);
        let anonymous = PaymentOrchestrator::new(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(StaticSession::anonymous()),
            Box::new(fallback),
            FallbackSwitch::new(),
        )
        .with_primary(Box::new(primary));
        assert!(!anonymous.probe_primary().await);
        assert!(anonymous.fallback_switch().is_engaged());
    }

    #[tokio::test]
    async fn test_numeric_transaction_id_completes_order() {
        let store = InMemoryOrderStore::new();
        let (fallback, _) =
            ScriptedTransport::new("fallback", vec![Ok(json!({ "transactionId": 12345 }))]);
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(StaticSession::anonymous()),
            Box::new(fallback),
            FallbackSwitch::new(),
        );

        let outcome = orchestrator.process_payment(card_request()).await.unwrap();

        assert_eq!(outcome.reference.as_deref(), Some("12345"));
        let order = store.get(&outcome.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.reference.as_deref(), Some("12345"));
    }

    #[tokio::test]
    async fn test_unreachable_primary_is_skipped_afterwards() {
        let store = InMemoryOrderStore::new();
        let (primary, primary_calls) = ScriptedTransport::new(
            "primary",
            vec![Err(PaymentError::Transport("Failed to send request".into()))],
        );
        let (fallback, fallback_calls) = ScriptedTransport::new(
            "fallback",
            vec![
                Ok(json!({ "transactionId": "t1" })),
                Ok(json!({ "transactionId": "t2" })),
            ],
        );
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(StaticSession::new("tok")),
            Box::new(fallback),
            FallbackSwitch::new(),
        )
        .with_primary(Box::new(primary));

        let first = orchestrator.process_payment(card_request()).await.unwrap();
        assert_eq!(first.reference.as_deref(), Some("t1"));
        assert_eq!(primary_calls.lock().unwrap().len(), 1);
        assert_eq!(fallback_calls.lock().unwrap().len(), 1);
        assert!(orchestrator.fallback_switch().is_engaged());
        let order = store.get(&first.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);

        let second = orchestrator.process_payment(card_request()).await.unwrap();
        assert_eq!(second.reference.as_deref(), Some("t2"));
        assert_eq!(primary_calls.lock().unwrap().len(), 1);
        assert_eq!(fallback_calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_rejection_after_unreachable_primary() {
        let store = InMemoryOrderStore::new();
        let (primary, primary_calls) = ScriptedTransport::new(
            "primary",
            vec![Err(PaymentError::Transport("Failed to send request".into()))],
        );
        let (fallback, fallback_calls) = ScriptedTransport::new(
            "fallback",
            vec![Err(PaymentError::Rejected("Card declined".into()))],
        );
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(StaticSession::new("tok")),
            Box::new(fallback),
            FallbackSwitch::new(),
        )
        .with_primary(Box::new(primary));

        let err = orchestrator.process_payment(card_request()).await.unwrap_err();

        assert!(matches!(err, PaymentError::Rejected(ref m) if m == "Card declined"));
        assert_eq!(primary_calls.lock().unwrap().len(), 1);
        assert_eq!(fallback_calls.lock().unwrap().len(), 1);
        let order_id = orchestrator.in_flight_order().await.unwrap();
        let order = store.get(&order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.error_message.as_deref(), Some("Card declined"));
    }

    #[tokio::test]
    async fn test_link_amount_overflow_fails_order() {
        let store = InMemoryOrderStore::new();
        let (fallback, fallback_calls) = ScriptedTransport::new("fallback", vec![]);
        let orchestrator = PaymentOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(StaticSession::anonymous()),
            Box::new(fallback),
            FallbackSwitch::new(),
        );
        let mut request = link_request();
        request.order.amount = Decimal::MAX / dec!(10);

        let err = orchestrator.process_payment(request).await.unwrap_err();

        assert!(matches!(err, PaymentError::ValidationError(_)));
        assert!(fallback_calls.lock().unwrap().is_empty());
        let order_id = orchestrator.in_flight_order().await.unwrap();
        let order = store.get(&order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
    }
}
