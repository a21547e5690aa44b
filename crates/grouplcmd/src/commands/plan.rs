//! Offline dry run: show what a group manifest would create.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use serde_json::{Value, json};

use grouplcm_core::Group;
use grouplcm_rollout::RolloutPlan;

/// Render the plan for `group` as JSON, one entry per batch.
///
/// Objects shared by a batch's templates (placement rule, binding) are
/// listed once, as the reconciler would create them once.
pub fn render(group: &Group) -> anyhow::Result<Value> {
    let plan = RolloutPlan::build(group)?;
    let batches = plan
        .batches
        .iter()
        .map(|planned| -> anyhow::Result<Value> {
            let mut seen = BTreeSet::new();
            let objects = planned
                .derived
                .iter()
                .flat_map(|d| d.iter())
                .filter(|obj| seen.insert(obj.key()))
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(json!({
                "batch": planned.batch.index,
                "sites": planned.batch.sites,
                "objects": objects,
            }))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(json!({
        "group": group.key().to_string(),
        "strategy": group.spec.upgrade_strategy.strategy_type,
        "batches": batches,
    }))
}

pub fn plan(path: &Path) -> anyhow::Result<()> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let group: Group =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&render(&group)?)?);
    Ok(())
}
