//! End-to-end reconcile scenarios against an in-memory object store.
//!
//! Covers the batch layouts of both strategies, the empty-site case and
//! convergence on a second pass.

use grouplcm_core::*;
use grouplcm_rollout::*;
use grouplcm_state::StateStore;
use serde_json::{Value, json};

fn test_store() -> StateStore {
    StateStore::open_in_memory().unwrap()
}

fn seed_group(store: &StateStore, strategy: &str, sites: &[&str]) -> Resource {
    let group = Group::new(
        "ztp-group",
        "grp",
        GroupSpec {
            sites: sites.iter().map(|s| s.to_string()).collect(),
            upgrade_strategy: UpgradeStrategy::new(strategy),
            group_policy_templates: vec![GroupPolicyTemplate::new(json!({
                "apiVersion": "policy.open-cluster-management.io/v1",
                "kind": "Policy",
                "metadata": {
                    "name": "pt1",
                    "namespace": "templates",
                    "annotations": { "ran.openshift.io/ztp-deploy-wave": "2" }
                },
                "spec": {
                    "remediationAction": "enforce",
                    "disabled": false,
                    "policy-templates": [{ "objectDefinition": { "kind": "ConfigurationPolicy" } }]
                }
            }))],
        },
    );
    store.put(&Resource::from_typed(&group).unwrap()).unwrap()
}

fn fetch(store: &StateStore, kind: &str, name: &str) -> Resource {
    store
        .get(&ObjectKey::new(kind, "ztp-group", name))
        .unwrap()
        .unwrap_or_else(|| panic!("{kind} {name} missing"))
}

fn selected_clusters(rule: &Resource) -> Vec<String> {
    rule.body["spec"]["clusters"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap().to_string())
        .collect()
}

fn applied(outcome: ReconcileOutcome) -> ReconcileReport {
    match outcome {
        ReconcileOutcome::Applied(report) => report,
        ReconcileOutcome::Deleted => panic!("group unexpectedly missing"),
    }
}

#[test]
fn parallel_group_gets_one_batch_triple() {
    let store = test_store();
    let group = seed_group(&store, "Parallel", &["c1", "c2", "c3"]);
    let reconciler = Reconciler::new(store.clone());

    let report = applied(reconciler.reconcile(&ObjectKey::group("ztp-group", "grp")).unwrap());
    assert_eq!(report.batches, 1);
    assert_eq!(report.created.len(), 3);

    let rule = fetch(&store, PLACEMENT_RULE_KIND, "grp-batch-1-placement-rule");
    assert_eq!(selected_clusters(&rule), vec!["c1", "c2", "c3"]);
    assert_eq!(rule.metadata.labels.get(APP_LABEL_KEY).map(String::as_str), Some(APP_LABEL_VALUE));

    let policy = fetch(&store, POLICY_KIND, "grp-batch-1-pt1-policy");
    assert_eq!(policy.body["spec"]["remediationAction"], "inform");
    assert_eq!(policy.body["spec"]["disabled"], false);
    assert_eq!(
        policy.metadata.extra["annotations"]["ran.openshift.io/ztp-deploy-wave"],
        "2"
    );

    let binding = fetch(&store, PLACEMENT_BINDING_KIND, "grp-batch-1-placement-binding");
    assert_eq!(binding.body["placementRef"]["name"], "grp-batch-1-placement-rule");
    assert_eq!(binding.body["placementRef"]["kind"], PLACEMENT_RULE_KIND);
    let subjects = binding.body["subjects"].as_array().unwrap();
    assert_eq!(subjects.len(), 1);
    assert_eq!(subjects[0]["name"], "grp-batch-1-pt1-policy");
    assert_eq!(subjects[0]["kind"], POLICY_KIND);

    let uid = group.metadata.uid.as_deref().unwrap();
    for obj in [&rule, &policy, &binding] {
        let owner = obj.controller_owner().unwrap();
        assert_eq!(owner.uid, uid);
        assert!(owner.block_owner_deletion);
    }
}

#[test]
fn serial_group_gets_one_batch_per_site() {
    let store = test_store();
    seed_group(&store, "Serial", &["c1", "c2", "c3"]);

    applied(
        Reconciler::new(store.clone())
            .reconcile(&ObjectKey::group("ztp-group", "grp"))
            .unwrap(),
    );

    let rules = store.list(Some(PLACEMENT_RULE_KIND), Some("ztp-group")).unwrap();
    assert_eq!(rules.len(), 3);
    let second = fetch(&store, PLACEMENT_RULE_KIND, "grp-batch-2-placement-rule");
    assert_eq!(selected_clusters(&second), vec!["c2"]);

    for batch in 1..=3 {
        fetch(&store, POLICY_KIND, &format!("grp-batch-{batch}-pt1-policy"));
        fetch(&store, PLACEMENT_BINDING_KIND, &format!("grp-batch-{batch}-placement-binding"));
    }
}

#[test]
fn empty_group_creates_nothing() {
    let store = test_store();
    seed_group(&store, "Parallel", &[]);

    let report = applied(
        Reconciler::new(store.clone())
            .reconcile(&ObjectKey::group("ztp-group", "grp"))
            .unwrap(),
    );
    assert_eq!(report.batches, 0);
    assert!(report.created.is_empty());
    assert_eq!(store.list(None, None).unwrap().len(), 1);
}

#[test]
fn second_pass_converges_without_writes() {
    let store = test_store();
    seed_group(&store, "Parallel", &["c1", "c2", "c3"]);
    let reconciler = Reconciler::new(store.clone());
    let key = ObjectKey::group("ztp-group", "grp");

    applied(reconciler.reconcile(&key).unwrap());
    let before: Vec<Value> = store
        .list(None, None)
        .unwrap()
        .iter()
        .map(|r| serde_json::to_value(r).unwrap())
        .collect();

    let mut events = store.subscribe();
    let report = applied(reconciler.reconcile(&key).unwrap());
    assert!(report.created.is_empty());
    assert_eq!(report.existing, 3);
    assert!(events.try_recv().is_err());

    let after: Vec<Value> = store
        .list(None, None)
        .unwrap()
        .iter()
        .map(|r| serde_json::to_value(r).unwrap())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn deleting_group_removes_everything_it_owns() {
    let store = test_store();
    seed_group(&store, "Serial", &["c1", "c2"]);
    let key = ObjectKey::group("ztp-group", "grp");
    applied(Reconciler::new(store.clone()).reconcile(&key).unwrap());

    let removed = store.delete(&key).unwrap();
    assert_eq!(removed[0], key);
    assert_eq!(removed.len(), 7);
    assert!(store.list(None, Some("ztp-group")).unwrap().is_empty());
}
