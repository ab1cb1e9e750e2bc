//! Application layer: the payment orchestrator and the services built on it.
//!
//! `PaymentOrchestrator` owns the order lifecycle of a payment attempt and the
//! choice between the primary and fallback transports. `CheckoutService` is the
//! checkout form's submit handler on top of it.

pub mod admin;
pub mod avatar;
pub mod checkout;
pub mod orchestrator;
