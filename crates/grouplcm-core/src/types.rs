//! Desired-state kinds owned by grouplcm.
//!
//! A `Group` names the sites to roll out to, the batching strategy, and the
//! policy templates to apply. It is pure data: planning and derivation live
//! in `grouplcm-rollout`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::names::{self, NameError};
use crate::object::{GROUP_API_VERSION, GROUP_KIND, ObjectKey, ObjectMeta, SITE_KIND};

/// Identifier of a managed cluster.
pub type SiteId = String;

// ── Group ──────────────────────────────────────────────────────────

/// A rollout request: which sites, in what batches, receive which policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: GroupSpec,
}

/// Desired state of a `Group`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
    /// Target sites, in rollout order.
    #[serde(default)]
    pub sites: Vec<SiteId>,
    #[serde(default)]
    pub upgrade_strategy: UpgradeStrategy,
    /// Policy templates, applied to every batch in this order.
    #[serde(default)]
    pub group_policy_templates: Vec<GroupPolicyTemplate>,
}

/// Batching strategy as written in the manifest.
///
/// The keyword is kept verbatim here; it is parsed into a closed enum when
/// the rollout is planned so that unknown values are rejected there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeStrategy {
    #[serde(rename = "type", default)]
    pub strategy_type: String,
}

impl UpgradeStrategy {
    pub fn new(strategy_type: &str) -> Self {
        Self {
            strategy_type: strategy_type.to_string(),
        }
    }
}

/// An embedded policy object. The body format belongs to the policy engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPolicyTemplate {
    pub object_definition: Value,
}

impl GroupPolicyTemplate {
    pub fn new(object_definition: Value) -> Self {
        Self { object_definition }
    }
}

impl Group {
    pub fn new(namespace: &str, name: &str, spec: GroupSpec) -> Self {
        Self {
            api_version: GROUP_API_VERSION.to_string(),
            kind: GROUP_KIND.to_string(),
            metadata: ObjectMeta::new(namespace, name),
            spec,
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::group(&self.metadata.namespace, &self.metadata.name)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Check the identity and site ids are usable as object names.
    pub fn validate(&self) -> Result<(), NameError> {
        names::validate_label("group name", &self.metadata.name)?;
        names::validate_label("group namespace", &self.metadata.namespace)?;
        for site in &self.spec.sites {
            names::validate_subdomain("site", site)?;
        }
        Ok(())
    }
}

// ── Site ───────────────────────────────────────────────────────────

/// A managed cluster and the policies it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: SiteSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteSpec {
    /// Name of the cluster backing this site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    /// Policy names attached to the site.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<String>,
}

impl Site {
    pub fn new(namespace: &str, name: &str, spec: SiteSpec) -> Self {
        Self {
            api_version: GROUP_API_VERSION.to_string(),
            kind: SITE_KIND.to_string(),
            metadata: ObjectMeta::new(namespace, name),
            spec,
        }
    }
}
