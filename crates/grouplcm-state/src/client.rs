//! The get/create boundary the reconciler talks to.

use grouplcm_core::{ObjectKey, OwnerReference, Resource};

use crate::error::{StateError, StateResult};

/// Minimal store surface needed to materialize derived objects.
///
/// `create` must fail with `StateError::AlreadyExists` when the name is
/// taken, so concurrent creators can tell a lost race from a real failure.
pub trait ResourceStore: Send + Sync {
    /// Fetch an object. `Ok(None)` means not found.
    fn get(&self, key: &ObjectKey) -> StateResult<Option<Resource>>;

    /// Create an object that must not exist yet. Returns the stored object
    /// (with its uid assigned).
    fn create(&self, obj: &Resource) -> StateResult<Resource>;

    /// Mark `owner` as the managing controller of `obj`, so that deleting
    /// the owner deletes `obj`.
    fn set_owner(&self, obj: &mut Resource, owner: &Resource) -> StateResult<()> {
        set_controller_reference(obj, owner)
    }
}

/// Add a controller owner reference pointing at `owner`.
///
/// Fails if the owner has no uid yet, lives in another namespace, or `obj`
/// is already controlled by a different owner. Setting the same owner twice
/// is a no-op.
pub fn set_controller_reference(obj: &mut Resource, owner: &Resource) -> StateResult<()> {
    let uid = owner
        .metadata
        .uid
        .clone()
        .ok_or_else(|| StateError::Owner(format!("owner {} has no uid", owner.key())))?;

    if owner.namespace() != obj.namespace() {
        return Err(StateError::Owner(format!(
            "cross-namespace owner {} for {}",
            owner.key(),
            obj.key()
        )));
    }

    if let Some(existing) = obj.controller_owner() {
        if existing.uid == uid {
            return Ok(());
        }
        return Err(StateError::Owner(format!(
            "{} is already controlled by {} {}",
            obj.key(),
            existing.kind,
            existing.name
        )));
    }

    obj.metadata.owner_references.push(OwnerReference {
        api_version: owner.api_version.clone(),
        kind: owner.kind.clone(),
        name: owner.name().to_string(),
        uid,
        controller: true,
        block_owner_deletion: true,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use grouplcm_core::{GROUP_API_VERSION, GROUP_KIND};

    fn owner(uid: Option<&str>) -> Resource {
        let mut res = Resource::new(GROUP_API_VERSION, GROUP_KIND, "ztp", "grp");
        res.metadata.uid = uid.map(str::to_string);
        res
    }

    #[test]
    fn sets_controller_reference() {
        let mut obj = Resource::new("v1", "Policy", "ztp", "p");
        set_controller_reference(&mut obj, &owner(Some("u1"))).unwrap();

        let reference = obj.controller_owner().unwrap();
        assert_eq!(reference.uid, "u1");
        assert_eq!(reference.kind, GROUP_KIND);
        assert_eq!(reference.name, "grp");
        assert!(reference.block_owner_deletion);
    }

    #[test]
    fn same_owner_twice_is_noop() {
        let mut obj = Resource::new("v1", "Policy", "ztp", "p");
        set_controller_reference(&mut obj, &owner(Some("u1"))).unwrap();
        set_controller_reference(&mut obj, &owner(Some("u1"))).unwrap();
        assert_eq!(obj.metadata.owner_references.len(), 1);
    }

    #[test]
    fn rejects_second_controller() {
        let mut obj = Resource::new("v1", "Policy", "ztp", "p");
        set_controller_reference(&mut obj, &owner(Some("u1"))).unwrap();
        let err = set_controller_reference(&mut obj, &owner(Some("u2"))).unwrap_err();
        assert!(matches!(err, StateError::Owner(_)));
    }

    #[test]
    fn rejects_owner_without_uid() {
        let mut obj = Resource::new("v1", "Policy", "ztp", "p");
        assert!(set_controller_reference(&mut obj, &owner(None)).is_err());
        assert!(obj.metadata.owner_references.is_empty());
    }

    #[test]
    fn rejects_cross_namespace_owner() {
        let mut obj = Resource::new("v1", "Policy", "other", "p");
        assert!(set_controller_reference(&mut obj, &owner(Some("u1"))).is_err());
    }
}
