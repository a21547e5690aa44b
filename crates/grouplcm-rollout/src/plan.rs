//! Whole-group rollout plan.
//!
//! The plan is computed in full before the reconciler writes anything, so a
//! bad strategy or a malformed template fails the pass with no side effects.

use tracing::debug;

use grouplcm_core::{Group, ObjectKey, Resource};

use crate::derive::{DerivedResources, derive};
use crate::error::{ReconcileError, ReconcileResult};
use crate::planner::{Batch, plan_group};

/// A batch and the objects derived for each of its policy templates.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedBatch {
    pub batch: Batch,
    /// One entry per policy template, in template order.
    pub derived: Vec<DerivedResources>,
}

/// Every object a group needs, batch-major and template-minor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RolloutPlan {
    pub batches: Vec<PlannedBatch>,
}

impl RolloutPlan {
    /// Validate the group, plan its batches and derive every object.
    pub fn build(group: &Group) -> ReconcileResult<Self> {
        group.validate().map_err(|e| ReconcileError::InvalidGroup {
            key: group.key().to_string(),
            reason: e.to_string(),
        })?;

        let key = group.key();
        let templates = &group.spec.group_policy_templates;
        let mut batches = Vec::new();
        for batch in plan_group(&group.spec)? {
            let derived = templates
                .iter()
                .enumerate()
                .map(|(i, template)| derive(&key, &batch, template, i))
                .collect::<Result<Vec<_>, _>>()?;
            debug!(group = %key, batch = batch.index, sites = ?batch.sites, "batch derived");
            batches.push(PlannedBatch { batch, derived });
        }
        Ok(Self { batches })
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Number of ensure operations a full pass performs.
    pub fn object_count(&self) -> usize {
        self.batches.iter().map(|b| b.derived.len() * 3).sum()
    }

    /// Every derived object in ensure order. Shared per-batch objects
    /// (placement rules, bindings) appear once per template.
    pub fn objects(&self) -> impl Iterator<Item = &Resource> {
        self.batches
            .iter()
            .flat_map(|b| b.derived.iter())
            .flat_map(DerivedResources::iter)
    }

    /// Policies no binding will reference.
    ///
    /// A batch has one binding, named without the template, so only the
    /// first template's policy is its subject. Policies of later templates
    /// are created but stay unbound.
    pub fn unbound_policies(&self) -> Vec<ObjectKey> {
        self.batches
            .iter()
            .flat_map(|b| b.derived.iter().skip(1))
            .map(|d| d.policy.key())
            .collect()
    }

    /// Site lists per batch, for logging.
    pub fn site_batches(&self) -> Vec<Vec<String>> {
        self.batches.iter().map(|b| b.batch.sites.clone()).collect()
    }
}
