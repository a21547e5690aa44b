//! Resource deriver: the objects that apply one policy template to one batch.
//!
//! For every (batch, template) pair a group yields three objects:
//!
//! ```text
//! PlacementRule  {group}-batch-{i}-placement-rule      selects the batch's sites
//! Policy         {group}-batch-{i}-{template}-policy   inform-only copy of the template
//! PlacementBinding {group}-batch-{i}-placement-binding binds the rule to the policy
//! ```
//!
//! Names are the identity of derived objects in the store. They must stay
//! stable across releases: renaming orphans every object already created.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use grouplcm_core::{
    APP_LABEL_KEY, APP_LABEL_VALUE, GroupPolicyTemplate, ObjectKey, PLACEMENT_API_GROUP,
    PLACEMENT_API_VERSION, PLACEMENT_BINDING_KIND, PLACEMENT_RULE_KIND, POLICY_API_GROUP,
    POLICY_API_VERSION, POLICY_KIND, Resource,
};

use crate::error::DeriveError;
use crate::planner::Batch;

/// Remediation mode forced on every derived policy: report, never enforce.
pub const INFORM: &str = "inform";

const REMEDIATION_ACTION: &str = "remediationAction";
const CLUSTER_AVAILABLE: &str = "ManagedClusterConditionAvailable";

/// The objects derived for one (batch, template) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedResources {
    pub placement_rule: Resource,
    pub policy: Resource,
    pub placement_binding: Resource,
}

impl DerivedResources {
    /// The objects in the order they are ensured.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        [&self.placement_rule, &self.policy, &self.placement_binding].into_iter()
    }
}

// ── Naming ─────────────────────────────────────────────────────────

pub fn placement_rule_name(group: &str, batch: u32) -> String {
    format!("{group}-batch-{batch}-placement-rule")
}

pub fn policy_name(group: &str, batch: u32, template: &str) -> String {
    format!("{group}-batch-{batch}-{template}-policy")
}

pub fn placement_binding_name(group: &str, batch: u32) -> String {
    format!("{group}-batch-{batch}-placement-binding")
}

// ── Template shape ─────────────────────────────────────────────────

/// The fields of a policy template the deriver touches. Everything else is
/// carried through untouched in the flattened maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyDocument {
    #[serde(default = "default_policy_api_version")]
    api_version: String,
    #[serde(default = "default_policy_kind")]
    kind: String,
    metadata: PolicyMetadata,
    spec: Map<String, Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PolicyMetadata {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

fn default_policy_api_version() -> String {
    POLICY_API_VERSION.to_string()
}

fn default_policy_kind() -> String {
    POLICY_KIND.to_string()
}

impl PolicyDocument {
    fn parse(raw: &Value) -> Result<Self, String> {
        if !raw.is_object() {
            return Err("object definition is not a map".to_string());
        }
        let doc: PolicyDocument = serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;
        if doc.metadata.name.is_empty() {
            return Err("metadata.name is empty".to_string());
        }
        // The binding subject is always a Policy; any other kind would leave
        // it pointing at nothing.
        if doc.kind != POLICY_KIND {
            return Err(format!("kind {:?} is not {POLICY_KIND}", doc.kind));
        }
        if doc.api_version != POLICY_API_VERSION {
            return Err(format!(
                "apiVersion {:?} is not {POLICY_API_VERSION}",
                doc.api_version
            ));
        }
        Ok(doc)
    }
}

// ── Derivation ─────────────────────────────────────────────────────

/// Derive the placement rule, policy and binding for one batch and template.
///
/// Pure and deterministic: identical inputs produce identical objects. Only
/// `group.name` and `group.namespace` are read from the key.
pub fn derive(
    group: &ObjectKey,
    batch: &Batch,
    template: &GroupPolicyTemplate,
    template_index: usize,
) -> Result<DerivedResources, DeriveError> {
    let malformed = |reason: String| DeriveError::MalformedTemplate {
        batch: batch.index,
        template: template_index,
        reason,
    };

    let doc = PolicyDocument::parse(&template.object_definition).map_err(malformed)?;

    let rule_name = placement_rule_name(&group.name, batch.index);
    let policy_name = policy_name(&group.name, batch.index, &doc.metadata.name);
    let binding_name = placement_binding_name(&group.name, batch.index);

    Ok(DerivedResources {
        placement_rule: build_placement_rule(&group.namespace, &rule_name, &batch.sites),
        policy: build_policy(&group.namespace, &policy_name, doc).map_err(malformed)?,
        placement_binding: build_placement_binding(
            &group.namespace,
            &binding_name,
            &rule_name,
            &policy_name,
        ),
    })
}

/// Selects the batch's sites, and only while they report available.
fn build_placement_rule(namespace: &str, name: &str, sites: &[String]) -> Resource {
    let clusters: Vec<Value> = sites.iter().map(|site| json!({ "name": site })).collect();
    Resource::new(PLACEMENT_API_VERSION, PLACEMENT_RULE_KIND, namespace, name)
        .with_label(APP_LABEL_KEY, APP_LABEL_VALUE)
        .with_field(
            "spec",
            json!({
                "clusterConditions": [
                    { "type": CLUSTER_AVAILABLE, "status": "True" }
                ],
                "clusters": clusters,
            }),
        )
}

/// Copy of the template, renamed into the group's namespace, inform-only.
fn build_policy(namespace: &str, name: &str, mut doc: PolicyDocument) -> Result<Resource, String> {
    doc.metadata.name = name.to_string();
    doc.metadata.namespace = Some(namespace.to_string());
    doc.spec
        .insert(REMEDIATION_ACTION.to_string(), Value::String(INFORM.to_string()));

    let value = serde_json::to_value(&doc).map_err(|e| e.to_string())?;
    let mut resource: Resource = serde_json::from_value(value).map_err(|e| e.to_string())?;
    // Identity and ownership belong to the copy, not the template.
    resource.metadata.uid = None;
    resource.metadata.owner_references.clear();
    Ok(resource.with_label(APP_LABEL_KEY, APP_LABEL_VALUE))
}

fn build_placement_binding(namespace: &str, name: &str, rule_name: &str, policy_name: &str) -> Resource {
    Resource::new(POLICY_API_VERSION, PLACEMENT_BINDING_KIND, namespace, name)
        .with_label(APP_LABEL_KEY, APP_LABEL_VALUE)
        .with_field(
            "placementRef",
            json!({
                "name": rule_name,
                "kind": PLACEMENT_RULE_KIND,
                "apiGroup": PLACEMENT_API_GROUP,
            }),
        )
        .with_field(
            "subjects",
            json!([
                {
                    "name": policy_name,
                    "kind": POLICY_KIND,
                    "apiGroup": POLICY_API_GROUP,
                }
            ]),
        )
}
