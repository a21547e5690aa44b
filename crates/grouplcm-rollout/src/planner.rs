//! Batch planner: splits a group's sites into ordered rollout waves.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use grouplcm_core::{GroupSpec, SiteId};

use crate::error::PlanError;
use crate::strategy::RolloutStrategy;

/// One rollout wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// 1-based position in the plan.
    pub index: u32,
    /// Member sites, in input order. Never empty.
    pub sites: Vec<SiteId>,
}

/// Split `sites` into batches.
///
/// The result is a non-overlapping cover of `sites` in input order. An empty
/// site list yields an empty plan. Duplicate site ids are rejected.
pub fn plan(sites: &[SiteId], strategy: RolloutStrategy) -> Result<Vec<Batch>, PlanError> {
    let mut seen = HashSet::with_capacity(sites.len());
    for site in sites {
        if !seen.insert(site.as_str()) {
            return Err(PlanError::DuplicateSite(site.clone()));
        }
    }

    if sites.is_empty() {
        return Ok(Vec::new());
    }

    let batches = match strategy {
        RolloutStrategy::AllAtOnce => vec![Batch {
            index: 1,
            sites: sites.to_vec(),
        }],
        RolloutStrategy::OneAtATime => sites
            .iter()
            .zip(1u32..)
            .map(|(site, index)| Batch {
                index,
                sites: vec![site.clone()],
            })
            .collect(),
    };
    Ok(batches)
}

/// Parse the group's strategy keyword and plan its sites.
pub fn plan_group(spec: &GroupSpec) -> Result<Vec<Batch>, PlanError> {
    let strategy: RolloutStrategy = spec.upgrade_strategy.strategy_type.parse()?;
    plan(&spec.sites, strategy)
}
