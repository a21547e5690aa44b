//! Manifest loading.
//!
//! Every `*.json` file under a directory holds either one object or an array
//! of objects. Objects are upserted into the store in path order, so a
//! reload after editing a file updates the stored desired state.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;

use grouplcm_core::{GROUP_KIND, Group, Resource};
use grouplcm_state::StateStore;

/// Collect `*.json` files under `dir`, sorted by path.
pub fn manifest_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "json")
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Parse one manifest file into resources.
///
/// Groups are decoded and name-checked here so a bad manifest fails at load
/// time rather than on every reconcile.
pub fn parse_file(path: &Path) -> anyhow::Result<Vec<Resource>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    items
        .into_iter()
        .map(|item| {
            let resource: Resource = serde_json::from_value(item)
                .with_context(|| format!("{}: not an object manifest", path.display()))?;
            if resource.kind == GROUP_KIND {
                let group: Group = resource
                    .to_typed()
                    .with_context(|| format!("{}: invalid group {}", path.display(), resource.key()))?;
                group
                    .validate()
                    .with_context(|| format!("{}: invalid group {}", path.display(), resource.key()))?;
            }
            Ok(resource)
        })
        .collect()
}

/// Upsert every manifest under `dir` into `store`. Returns the object count.
pub fn load_dir(store: &StateStore, dir: &Path) -> anyhow::Result<usize> {
    let mut count = 0;
    for path in manifest_files(dir)? {
        for resource in parse_file(&path)? {
            let stored = store.put(&resource)?;
            debug!(file = %path.display(), object = %stored.key(), "manifest applied");
            count += 1;
        }
    }
    info!(dir = %dir.display(), objects = count, "manifests loaded");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP: &str = r#"{
        "apiVersion": "ran.openshift.io/v1alpha1",
        "kind": "Group",
        "metadata": { "name": "grp", "namespace": "ztp" },
        "spec": { "sites": ["c1"], "upgradeStrategy": { "type": "Parallel" } }
    }"#;

    #[test]
    fn only_json_files_are_collected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.json"), GROUP).unwrap();
        std::fs::write(dir.path().join("nested/a.json"), GROUP).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let files = manifest_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn array_manifest_yields_every_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.json");
        let site = r#"{ "apiVersion": "ran.openshift.io/v1alpha1", "kind": "Site",
                        "metadata": { "name": "c1", "namespace": "ztp" } }"#;
        std::fs::write(&path, format!("[{GROUP}, {site}]")).unwrap();

        let objects = parse_file(&path).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].kind, "Group");
        assert_eq!(objects[1].kind, "Site");
    }

    #[test]
    fn invalid_group_name_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, GROUP.replace("\"grp\"", "\"Bad_Name\"")).unwrap();
        let err = parse_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("invalid group"));
    }

    #[test]
    fn load_dir_upserts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("grp.json"), GROUP).unwrap();
        let store = StateStore::open_in_memory().unwrap();

        assert_eq!(load_dir(&store, dir.path()).unwrap(), 1);
        assert_eq!(load_dir(&store, dir.path()).unwrap(), 1);
        assert_eq!(store.list(Some("Group"), None).unwrap().len(), 1);
    }
}
