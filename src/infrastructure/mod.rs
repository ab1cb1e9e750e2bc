//! Adapters for the domain ports.

pub(crate) mod http;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod supabase;
pub mod transports;
pub mod tropipay;
