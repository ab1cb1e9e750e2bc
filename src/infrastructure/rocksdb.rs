use crate::domain::order::{NewOrder, Order, OrderUpdate};
use crate::domain::ports::OrderStore;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Column Family for storing orders.
pub const CF_ORDERS: &str = "orders";

/// A persistent order table backed by RocksDB.
///
/// Orders are stored as JSON under their id in the `orders` column family.
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBOrderStore {
    db: Arc<DB>,
}

impl RocksDBOrderStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_orders = ColumnFamilyDescriptor::new(CF_ORDERS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_orders])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn write(&self, order: &Order) -> Result<()> {
        let cf = self.db.cf_handle(CF_ORDERS).ok_or_else(missing_cf)?;
        let value = serde_json::to_vec(order)?;
        self.db.put_cf(&cf, order.id.as_bytes(), value)?;
        Ok(())
    }

    fn read(&self, order_id: &str) -> Result<Option<Order>> {
        let cf = self.db.cf_handle(CF_ORDERS).ok_or_else(missing_cf)?;
        match self.db.get_cf(&cf, order_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn missing_cf() -> PaymentError {
    PaymentError::InternalError(Box::new(std::io::Error::other(
        "Orders column family not found",
    )))
}

#[async_trait]
impl OrderStore for RocksDBOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<Order> {
        let order = order.into_order(Uuid::new_v4().to_string());
        self.write(&order)?;
        Ok(order)
    }

    async fn get(&self, order_id: &str) -> Result<Option<Order>> {
        self.read(order_id)
    }

    async fn update(&self, order_id: &str, update: OrderUpdate) -> Result<Order> {
        let mut order = self
            .read(order_id)?
            .ok_or_else(|| PaymentError::OrderNotFound(order_id.to_string()))?;
        order.apply(update);
        self.write(&order)?;
        Ok(order)
    }
}
