//! Reconciler: materializes a group's rollout plan in the object store.
//!
//! One pass fetches the group, builds the full plan, then walks batches in
//! index order and templates in template order, ensuring each derived
//! object exists:
//!
//! - present: left exactly as found (no comparison, no patch)
//! - absent: created with a controller owner reference to the group
//!
//! Because names are deterministic and ensure never mutates, re-running a
//! pass after a partial failure converges on the same objects. Deleting the
//! group is left to the store's owner-reference garbage collection.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use grouplcm_core::{Group, ObjectKey, Resource};
use grouplcm_state::ResourceStore;

use crate::error::{ReconcileError, ReconcileResult};
use crate::plan::RolloutPlan;
use crate::planner::Batch;

/// Decides whether the rollout may move past a completed batch.
///
/// Evaluated between batches. Returning `false` stops the pass before the
/// next batch's objects are created; a later pass asks again.
pub trait AdvanceGate: Send + Sync {
    fn should_advance(&self, group: &Group, completed: &Batch) -> bool;
}

/// Creates every batch's objects in the same pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct EagerAdvance;

impl AdvanceGate for EagerAdvance {
    fn should_advance(&self, _group: &Group, _completed: &Batch) -> bool {
        true
    }
}

/// What a reconcile pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The group no longer exists; nothing to do.
    Deleted,
    Applied(ReconcileReport),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Batches whose objects were ensured.
    pub batches: usize,
    /// Objects created by this pass, in creation order.
    pub created: Vec<ObjectKey>,
    /// Ensure calls that found the object already present.
    pub existing: usize,
    /// Index of the first batch held back by the advance gate.
    pub gated_at: Option<u32>,
    /// Objects found under a derived name but controlled by a different
    /// owner. Counted in `existing` too; never modified.
    pub foreign: Vec<ObjectKey>,
}

/// Drives one group at a time through plan → derive → ensure.
pub struct Reconciler<S> {
    store: S,
    gate: Box<dyn AdvanceGate>,
}

impl<S: ResourceStore> Reconciler<S> {
    /// Create a reconciler that advances through all batches eagerly.
    pub fn new(store: S) -> Self {
        Self {
            store,
            gate: Box::new(EagerAdvance),
        }
    }

    /// Replace the batch advance gate.
    pub fn with_gate(mut self, gate: impl AdvanceGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one reconcile pass for the group at `key`.
    pub fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<ReconcileOutcome> {
        self.run(key, None)
    }

    /// Like `reconcile`, but abandons the pass before the next ensure once
    /// `cancel` reads `true`. Objects already created stay.
    pub fn reconcile_with_cancel(
        &self,
        key: &ObjectKey,
        cancel: &watch::Receiver<bool>,
    ) -> ReconcileResult<ReconcileOutcome> {
        self.run(key, Some(cancel))
    }

    fn run(
        &self,
        key: &ObjectKey,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> ReconcileResult<ReconcileOutcome> {
        let Some(owner) = self.store.get(key)? else {
            debug!(group = %key, "group not found, assuming deleted");
            return Ok(ReconcileOutcome::Deleted);
        };
        let group: Group = owner.to_typed().map_err(|e| ReconcileError::InvalidGroup {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let plan = RolloutPlan::build(&group)?;
        info!(
            group = %key,
            upgrade_plan = ?plan.site_batches(),
            templates = group.spec.group_policy_templates.len(),
            "upgrade plan created"
        );
        let unbound = plan.unbound_policies();
        if !unbound.is_empty() {
            warn!(
                group = %key,
                unbound = ?unbound,
                "placement bindings only reference the first template's policy"
            );
        }

        let mut report = ReconcileReport::default();
        let last = plan.batches.len();
        for (pos, planned) in plan.batches.iter().enumerate() {
            for derived in &planned.derived {
                for desired in derived.iter() {
                    if cancel.is_some_and(|c| *c.borrow()) {
                        warn!(group = %key, batch = planned.batch.index, "reconcile cancelled");
                        return Err(ReconcileError::Cancelled);
                    }
                    self.ensure(&owner, desired, &mut report)?;
                }
            }
            report.batches += 1;

            if pos + 1 < last && !self.gate.should_advance(&group, &planned.batch) {
                let next = planned.batch.index + 1;
                info!(group = %key, batch = next, "advance gate closed, holding remaining batches");
                report.gated_at = Some(next);
                break;
            }
        }

        info!(
            group = %key,
            batches = report.batches,
            created = report.created.len(),
            existing = report.existing,
            foreign = report.foreign.len(),
            "group reconciled"
        );
        Ok(ReconcileOutcome::Applied(report))
    }

    /// Create `desired` unless an object with its name already exists.
    fn ensure(
        &self,
        owner: &Resource,
        desired: &Resource,
        report: &mut ReconcileReport,
    ) -> ReconcileResult<()> {
        let key = desired.key();
        if let Some(found) = self.store.get(&key)? {
            match found.controller_owner() {
                Some(other) if Some(other.uid.as_str()) != owner.metadata.uid.as_deref() => {
                    warn!(
                        object = %key,
                        owner_kind = %other.kind,
                        owner = %other.name,
                        "derived name is held by another owner, leaving it as is"
                    );
                    report.foreign.push(key);
                }
                _ => debug!(object = %key, "already present"),
            }
            report.existing += 1;
            return Ok(());
        }

        let mut obj = desired.clone();
        self.store.set_owner(&mut obj, owner)?;
        match self.store.create(&obj) {
            Ok(_) => {
                info!(object = %key, "created API object");
                report.created.push(key);
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!(object = %key, "created concurrently by another pass");
                report.existing += 1;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
