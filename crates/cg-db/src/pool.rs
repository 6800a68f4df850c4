//! Bounded warehouse session pool.
//!
//! Every warehouse call goes through a [`WarehouseLease`]; at most
//! `size` leases exist at once, and a lease returns its slot when dropped,
//! including when the task holding it is cancelled.

use crate::error::{DbError, DbResult};
use crate::traits::Warehouse;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Shared handle to a warehouse with a fixed number of concurrent sessions
#[derive(Clone)]
pub struct WarehousePool {
    warehouse: Arc<dyn Warehouse>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl WarehousePool {
    /// Create a pool allowing `size` concurrent sessions (at least one).
    pub fn new(warehouse: Arc<dyn Warehouse>, size: usize) -> Self {
        let size = size.max(1);
        Self {
            warehouse,
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Wait for a free session.
    pub async fn acquire(&self) -> DbResult<WarehouseLease> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| DbError::PoolClosed)?;
        Ok(WarehouseLease {
            warehouse: Arc::clone(&self.warehouse),
            _permit: permit,
        })
    }

    /// Refuse new leases; outstanding leases stay valid until dropped.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Configured number of sessions
    pub fn size(&self) -> usize {
        self.size
    }

    /// Sessions not currently leased
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Warehouse type identifier for logging
    pub fn db_type(&self) -> &'static str {
        self.warehouse.db_type()
    }
}

/// A leased warehouse session, released on drop
pub struct WarehouseLease {
    warehouse: Arc<dyn Warehouse>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for WarehouseLease {
    type Target = dyn Warehouse;

    fn deref(&self) -> &Self::Target {
        self.warehouse.as_ref()
    }
}
