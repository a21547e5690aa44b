//! Generic resource envelope.
//!
//! Every object the controller reads or writes is carried as a `Resource`:
//! `apiVersion`, `kind`, `metadata`, and the rest of the document kept as an
//! opaque JSON map. Typed kinds (`Group`, `Site`) convert to and from this
//! envelope through serde.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── API groups and kinds ───────────────────────────────────────────

pub const GROUP_API_VERSION: &str = "ran.openshift.io/v1alpha1";
pub const GROUP_KIND: &str = "Group";
pub const SITE_KIND: &str = "Site";

pub const PLACEMENT_API_GROUP: &str = "apps.open-cluster-management.io";
pub const PLACEMENT_API_VERSION: &str = "apps.open-cluster-management.io/v1";
pub const PLACEMENT_RULE_KIND: &str = "PlacementRule";

pub const POLICY_API_GROUP: &str = "policy.open-cluster-management.io";
pub const POLICY_API_VERSION: &str = "policy.open-cluster-management.io/v1";
pub const POLICY_KIND: &str = "Policy";
pub const PLACEMENT_BINDING_KIND: &str = "PlacementBinding";

/// Label stamped on every derived object.
pub const APP_LABEL_KEY: &str = "app";
pub const APP_LABEL_VALUE: &str = "cluster-group-lcm";

// ── Metadata ───────────────────────────────────────────────────────

/// Object metadata: identity, labels and ownership.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    /// Assigned by the store when the object is first written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    /// Metadata fields not modeled above (annotations, finalizers, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObjectMeta {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }
}

/// Link from a dependent object to the object that owns it.
///
/// Deleting the owner garbage-collects every object whose owner
/// references carry the owner's uid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(default)]
    pub controller: bool,
    #[serde(default)]
    pub block_owner_deletion: bool,
}

/// Store identity of an object: `(kind, namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Key for a `Group` object.
    pub fn group(namespace: &str, name: &str) -> Self {
        Self::new(GROUP_KIND, namespace, name)
    }

    /// Build the composite key for the objects table: `{kind}/{namespace}/{name}`.
    pub fn table_key(&self) -> String {
        format!("{}/{}/{}", self.kind, self.namespace, self.name)
    }

    /// Parse a composite table key back into its parts.
    pub fn from_table_key(key: &str) -> Option<Self> {
        let mut parts = key.splitn(3, '/');
        let kind = parts.next()?;
        let namespace = parts.next()?;
        let name = parts.next()?;
        Some(Self::new(kind, namespace, name))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

// ── Resource ───────────────────────────────────────────────────────

/// A stored object with an opaque body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Every top-level field other than `apiVersion`, `kind` and `metadata`.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Resource {
    /// Create an empty object of the given kind.
    pub fn new(api_version: &str, kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            metadata: ObjectMeta::new(namespace, name),
            body: Map::new(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.kind, &self.metadata.namespace, &self.metadata.name)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// The owner reference flagged as managing controller, if any.
    pub fn controller_owner(&self) -> Option<&OwnerReference> {
        self.metadata.owner_references.iter().find(|r| r.controller)
    }

    /// Set a top-level body field, replacing any previous value.
    pub fn with_field(mut self, field: &str, value: Value) -> Self {
        self.body.insert(field.to_string(), value);
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.metadata
            .labels
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Convert a typed kind into the generic envelope.
    pub fn from_typed<T: Serialize>(obj: &T) -> serde_json::Result<Self> {
        serde_json::from_value(serde_json::to_value(obj)?)
    }

    /// Convert the envelope into a typed kind.
    pub fn to_typed<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(serde_json::to_value(self)?)
    }
}
