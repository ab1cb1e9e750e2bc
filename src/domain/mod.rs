//! Domain types and the ports the application layer talks through.

pub mod auth;
pub mod meal;
pub mod order;
pub mod payment;
pub mod ports;
