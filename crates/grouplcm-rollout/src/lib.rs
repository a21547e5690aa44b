//! grouplcm rollout engine: batch planning, derivation, reconciliation.
//!
//! This crate turns a `Group` into the placement rules, policies and
//! placement bindings that apply its policy templates to its sites, one
//! batch (rollout wave) at a time, and materializes them in the object
//! store with create-if-absent semantics.
//!
//! # Components
//!
//! - **`strategy`**: Closed set of batching strategies (AllAtOnce, OneAtATime)
//! - **`planner`**: Sites + strategy → ordered batches (pure)
//! - **`derive`**: Batch + policy template → derived object triple (pure)
//! - **`plan`**: Whole-group rollout plan, derived before any write
//! - **`controller`**: Reconciler: fetch, plan, ensure with owner references

pub mod controller;
pub mod derive;
pub mod error;
pub mod plan;
pub mod planner;
pub mod strategy;

pub use controller::{AdvanceGate, EagerAdvance, ReconcileOutcome, ReconcileReport, Reconciler};
pub use derive::{
    DerivedResources, derive, placement_binding_name, placement_rule_name, policy_name,
};
pub use error::{DeriveError, PlanError, ReconcileError, ReconcileResult};
pub use plan::{PlannedBatch, RolloutPlan};
pub use planner::{Batch, plan, plan_group};
pub use strategy::RolloutStrategy;
