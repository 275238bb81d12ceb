use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::ClientId;

/// Per-client mutexes serializing balance-affecting operations.
///
/// Operations on different clients proceed in parallel; operations on the
/// same client run one at a time in arrival order.
#[derive(Default)]
pub struct ClientLocks {
    locks: DashMap<ClientId, Arc<Mutex<()>>>,
}

impl ClientLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a client's balances.
    pub async fn lock(&self, client_id: ClientId) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the map shard is not held across the await.
        let mutex = self
            .locks
            .entry(client_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drop the mutex of a deleted client.
    pub fn forget(&self, client_id: ClientId) {
        self.locks.remove(&client_id);
    }
}
