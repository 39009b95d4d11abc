//! Shared test doubles for the integration tests.

// not every test binary uses every helper
#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use quiver::backend::{CompletionStatus, Synchronization, TransactionContext};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// In-memory stand-in for the host's transaction: collects registered
/// synchronizations and fires them on commit or rollback.
pub struct TestTransaction {
    id: u64,
    synchronizations: Mutex<Vec<Arc<dyn Synchronization>>>,
}

impl TestTransaction {
    pub fn begin() -> Self {
        TestTransaction {
            id: NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
            synchronizations: Mutex::new(Vec::new()),
        }
    }

    pub fn commit(&self) {
        self.complete(CompletionStatus::Committed);
    }

    pub fn rollback(&self) {
        self.complete(CompletionStatus::RolledBack);
    }

    fn complete(&self, status: CompletionStatus) {
        let synchronizations = std::mem::take(&mut *self.synchronizations.lock().unwrap());
        for synchronization in synchronizations {
            synchronization
                .after_completion(status)
                .expect("completion must not fail");
        }
    }
}

impl TransactionContext for TestTransaction {
    fn is_transaction_in_progress(&self) -> bool {
        true
    }

    fn transaction_id(&self) -> u64 {
        self.id
    }

    fn register_synchronization(&self, synchronization: Arc<dyn Synchronization>) {
        self.synchronizations.lock().unwrap().push(synchronization);
    }
}
