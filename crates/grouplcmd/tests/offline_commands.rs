//! Offline command tests: manifest loading, dry-run planning and listing
//! against an on-disk store.

use grouplcm_core::*;
use grouplcm_rollout::{ReconcileOutcome, Reconciler};
use grouplcm_state::StateStore;
use grouplcmd::commands::{list, plan};
use grouplcmd::manifests;

const GROUP: &str = r#"{
    "apiVersion": "ran.openshift.io/v1alpha1",
    "kind": "Group",
    "metadata": { "name": "grp", "namespace": "ztp-group" },
    "spec": {
        "sites": ["c1", "c2", "c3"],
        "upgradeStrategy": { "type": "Parallel" },
        "groupPolicyTemplates": [
            { "objectDefinition": {
                "apiVersion": "policy.open-cluster-management.io/v1",
                "kind": "Policy",
                "metadata": { "name": "pt1" },
                "spec": { "remediationAction": "enforce", "disabled": false }
            } }
        ]
    }
}"#;

#[test]
fn plan_renders_one_batch_triple() {
    let group: Group = serde_json::from_str(GROUP).unwrap();
    let rendered = plan::render(&group).unwrap();

    assert_eq!(rendered["group"], "Group ztp-group/grp");
    let batches = rendered["batches"].as_array().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0]["sites"], serde_json::json!(["c1", "c2", "c3"]));

    let names: Vec<&str> = batches[0]["objects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["metadata"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "grp-batch-1-placement-rule",
            "grp-batch-1-pt1-policy",
            "grp-batch-1-placement-binding",
        ]
    );
}

#[test]
fn plan_lists_shared_objects_once() {
    let mut group: Group = serde_json::from_str(GROUP).unwrap();
    group.spec.upgrade_strategy = UpgradeStrategy::new("Serial");
    let mut second = group.spec.group_policy_templates[0].clone();
    second.object_definition["metadata"]["name"] = "pt2".into();
    group.spec.group_policy_templates.push(second);

    let rendered = plan::render(&group).unwrap();
    let batches = rendered["batches"].as_array().unwrap();
    assert_eq!(batches.len(), 3);
    for batch in batches {
        assert_eq!(batch["objects"].as_array().unwrap().len(), 4);
    }
}

#[test]
fn plan_rejects_unknown_strategy() {
    let mut group: Group = serde_json::from_str(GROUP).unwrap();
    group.spec.upgrade_strategy = UpgradeStrategy::new("Rolling");
    let err = plan::render(&group).unwrap_err();
    assert!(err.to_string().contains("Rolling"));
}

#[test]
fn manifests_reconcile_and_persist() {
    let manifests_dir = tempfile::tempdir().unwrap();
    std::fs::write(manifests_dir.path().join("grp.json"), GROUP).unwrap();
    let data_dir = tempfile::tempdir().unwrap();
    let db_path = data_dir.path().join("grouplcm.redb");

    {
        let store = StateStore::open(&db_path).unwrap();
        assert_eq!(manifests::load_dir(&store, manifests_dir.path()).unwrap(), 1);
        let outcome = Reconciler::new(store)
            .reconcile(&ObjectKey::group("ztp-group", "grp"))
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Applied(_)));
    }

    let store = StateStore::open(&db_path).unwrap();
    let objects = store.list(None, Some("ztp-group")).unwrap();
    assert_eq!(objects.len(), 4);

    let table = list::format_objects(&objects);
    assert_eq!(table.lines().count(), 4);
    assert!(table.contains("ztp-group/grp-batch-1-pt1-policy"));
    assert!(table.contains("Group/grp"));
}
