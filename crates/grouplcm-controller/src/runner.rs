//! Controller run loop.
//!
//! Maps store events to group keys, runs reconcile workers and retries
//! failed passes with backoff until shutdown is signalled.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use grouplcm_core::config::ControllerConfig;
use grouplcm_core::{GROUP_KIND, ObjectKey};
use grouplcm_rollout::{ReconcileError, ReconcileOutcome, Reconciler};
use grouplcm_state::{ResourceEvent, StateStore};

use crate::error::{ControllerError, ControllerResult};
use crate::queue::WorkQueue;

/// The group a store event should wake up.
///
/// Group events map to the group itself. Any other object maps to its
/// controlling owner when that owner is a group, so deleting a derived
/// object out from under the controller gets it recreated.
pub fn group_for_event(event: &ResourceEvent) -> Option<ObjectKey> {
    let obj = &event.object;
    if obj.kind == GROUP_KIND {
        return Some(obj.key());
    }
    obj.controller_owner()
        .filter(|owner| owner.kind == GROUP_KIND)
        .map(|owner| ObjectKey::group(obj.namespace(), &owner.name))
}

pub struct Controller {
    store: StateStore,
    reconciler: Arc<Reconciler<StateStore>>,
    queue: Arc<WorkQueue>,
    workers: usize,
}

impl Controller {
    pub fn new(store: StateStore, config: &ControllerConfig) -> Self {
        let reconciler = Reconciler::new(store.clone());
        Self::with_reconciler(store, reconciler, config)
    }

    /// Use a pre-built reconciler (for a custom advance gate).
    pub fn with_reconciler(
        store: StateStore,
        reconciler: Reconciler<StateStore>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            store,
            reconciler: Arc::new(reconciler),
            queue: Arc::new(WorkQueue::new(config.backoff_base(), config.backoff_max())),
            workers: config.workers.max(1),
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Queue every group currently in the store. Returns how many.
    pub fn enqueue_existing(&self) -> ControllerResult<usize> {
        let groups = self.store.list(Some(GROUP_KIND), None)?;
        for group in &groups {
            self.queue.add(group.key());
        }
        Ok(groups.len())
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// In-flight passes see the same signal and stop before their next
    /// create.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> ControllerResult<()> {
        let mut events = self.store.subscribe();
        let queued = self.enqueue_existing()?;
        info!(workers = self.workers, groups = queued, "controller started");

        let handles: Vec<JoinHandle<()>> = (0..self.workers)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    Arc::clone(&self.queue),
                    Arc::clone(&self.reconciler),
                    shutdown.clone(),
                ))
            })
            .collect();

        let stopped = *shutdown.borrow();
        if !stopped {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => {
                            if let Some(key) = group_for_event(&event) {
                                debug!(object = %event.key(), group = %key, kind = ?event.kind, "change observed");
                                self.queue.add(key);
                            }
                        }
                        Err(RecvError::Lagged(missed)) => {
                            warn!(missed, "event stream lagged, requeueing all groups");
                            if let Err(e) = self.enqueue_existing() {
                                error!(error = %e, "failed to requeue groups");
                            }
                        }
                        Err(RecvError::Closed) => {
                            warn!("event stream closed");
                            break;
                        }
                    },
                    _ = shutdown.changed() => {
                        info!("controller shutting down");
                        break;
                    }
                }
            }
        }

        self.queue.shut_down();
        for (id, handle) in handles.into_iter().enumerate() {
            handle.await.map_err(|e| ControllerError::Worker {
                worker: id,
                reason: e.to_string(),
            })?;
        }
        info!("controller stopped");
        Ok(())
    }
}

async fn worker(
    id: usize,
    queue: Arc<WorkQueue>,
    reconciler: Arc<Reconciler<StateStore>>,
    cancel: watch::Receiver<bool>,
) {
    debug!(worker = id, "worker started");
    while let Some(key) = queue.next().await {
        let result = {
            let reconciler = Arc::clone(&reconciler);
            let cancel = cancel.clone();
            let key = key.clone();
            tokio::task::spawn_blocking(move || reconciler.reconcile_with_cancel(&key, &cancel)).await
        };

        match result {
            Ok(Ok(ReconcileOutcome::Deleted)) => {
                debug!(worker = id, group = %key, "group gone");
                queue.forget(&key);
            }
            Ok(Ok(ReconcileOutcome::Applied(report))) => {
                debug!(
                    worker = id,
                    group = %key,
                    created = report.created.len(),
                    gated_at = ?report.gated_at,
                    "pass complete"
                );
                queue.forget(&key);
            }
            Ok(Err(ReconcileError::Cancelled)) => {
                debug!(worker = id, group = %key, "pass cancelled");
            }
            Ok(Err(e)) => {
                let delay = queue.backoff(&key);
                if e.is_configuration() {
                    error!(worker = id, group = %key, error = %e, retry_in = ?delay, "group misconfigured");
                } else {
                    warn!(worker = id, group = %key, error = %e, retry_in = ?delay, "reconcile failed");
                }
                queue.add_after(key.clone(), delay);
            }
            Err(e) => {
                let delay = queue.backoff(&key);
                error!(worker = id, group = %key, error = %e, retry_in = ?delay, "reconcile task panicked");
                queue.add_after(key.clone(), delay);
            }
        }
        queue.done(&key);
    }
    debug!(worker = id, "worker stopped");
}
