//! Background worker for periodic index reconciliation

use crate::handlers::SharedStore;
use projects_store::{CrudError, ErrorKind, IndexAudit, Operation};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

/// Runs [`projects_store::ProjectStore::reconcile`] on a schedule
///
/// Each pass removes index entries whose hash is gone and indexes hashes the
/// index lost track of. Failed passes are logged and retried on the next
/// tick.
pub struct ReconcileWorker {
    store: SharedStore,
    interval: Duration,
}

impl ReconcileWorker {
    /// Create a worker running every `interval`
    pub fn new(store: SharedStore, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run one reconciliation pass on the blocking pool
    pub async fn pass(&self) -> Result<IndexAudit, CrudError> {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.reconcile()).await {
            Ok(result) => result,
            Err(e) => Err(CrudError::new(
                ErrorKind::UnknownStore,
                Operation::Reconcile,
                format!("reconcile task failed: {}", e),
                "worker",
            )),
        }
    }

    /// Run until `shutdown` turns true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);

        tracing::info!("Reconcile worker started (interval: {:?})", self.interval);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    self.log_pass().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Reconcile worker stopped");
    }

    /// Run for a specific number of passes (useful for testing)
    pub async fn run_cycles(&self, cycles: usize) -> Vec<Result<IndexAudit, CrudError>> {
        let mut ticker = interval(self.interval);
        let mut results = Vec::with_capacity(cycles);

        for cycle in 0..cycles {
            ticker.tick().await;
            tracing::debug!("Starting reconcile pass {}/{}", cycle + 1, cycles);
            results.push(self.pass().await);
        }

        results
    }

    async fn log_pass(&self) {
        match self.pass().await {
            Ok(audit) if audit.is_consistent() => {
                tracing::debug!("Reconcile pass: index consistent");
            }
            Ok(audit) => {
                tracing::info!(
                    "Reconcile pass: removed {:?} from index, indexed {:?}",
                    audit.dangling,
                    audit.orphaned
                );
            }
            Err(e) => {
                tracing::error!("Reconcile pass failed: {}", e);
            }
        }
    }
}
