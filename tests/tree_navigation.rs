//! Tree definitions, rules and recursive branch loading

mod common;

use common::{root_branch, stub_client};
use opentsdb_client::transport::Method;
use opentsdb_client::{Branch, BranchRef, Entity, Error, Rule, RuleType, TreeDefinition};
use serde_json::json;

// =============================================================================
// Test Helpers
// =============================================================================

fn stored_tree() -> serde_json::Value {
    json!({
        "name": "Network",
        "description": "Network devices",
        "notes": "",
        "rules": null,
        "created": 1356998400,
        "treeId": 1,
        "strictMatch": false,
        "storeFailures": true,
        "enabled": false
    })
}

fn leaf(metric: &str, host: &str, tsuid: &str) -> serde_json::Value {
    json!({"metric": metric, "tags": {"host": host}, "tsuid": tsuid, "displayName": host})
}

// =============================================================================
// Tree definition lifecycle
// =============================================================================

#[test]
fn test_create_then_edit_then_delete() {
    let client = stub_client();
    let mut tree = TreeDefinition::new("Network")
        .unwrap()
        .with_description("Network devices")
        .with_store_failures(true);

    client.transport().push_json(200, stored_tree());
    tree.create(&client).unwrap();
    assert_eq!(tree.tree_id, Some(1));
    assert!(tree.is_materialized());

    let create = client.transport().last_request().unwrap();
    assert_eq!(create.method, Method::Post);
    assert_eq!(create.path, "/api/tree");
    let body = create.body.unwrap();
    assert_eq!(body["name"], "Network");
    assert_eq!(body["storeFailures"], true);
    assert!(body.get("treeId").is_none());

    let mut edited = stored_tree();
    edited["enabled"] = json!(true);
    client.transport().push_json(200, edited);
    tree.enabled = true;
    tree.save_to(&client).unwrap();
    assert!(tree.enabled);
    assert_eq!(client.transport().last_request().unwrap().body.unwrap()["treeId"], 1);

    client.transport().push_empty(204);
    tree.delete(&client).unwrap();
    let delete = client.transport().last_request().unwrap();
    assert_eq!(delete.method, Method::Delete);
    assert_eq!(delete.body.unwrap(), json!({"treeId": 1, "definition": true}));
    assert_eq!(tree.tree_id, None);
    assert_eq!(tree.created, None);
    assert!(!tree.enabled);
}

#[test]
fn test_create_materialized_tree_fails_without_io() {
    let client = stub_client();
    let mut tree = TreeDefinition::from_value(stored_tree()).unwrap();
    assert!(matches!(tree.create(&client), Err(Error::Validation(_))));
    assert_eq!(client.transport().request_count(), 0);
}

#[test]
fn test_load_tree_with_rules() {
    let client = stub_client();
    let mut stored = stored_tree();
    stored["rules"] = json!({
        "0": {"0": {"treeId": 1, "level": 0, "order": 0, "type": "TAGK", "field": "host",
                    "regex": "", "separator": "", "description": "", "notes": "",
                    "regexGroupIdx": 0, "displayFormat": "", "customField": ""}},
        "1": {"0": {"treeId": 1, "level": 1, "order": 0, "type": "METRIC", "separator": "\\.",
                    "regexGroupIdx": 0}}
    });
    client.transport().push_json(200, stored);

    let tree = client.get_tree(1).unwrap();
    assert_eq!(tree.rule_count(), 2);
    let rule = tree.rule(0, 0).unwrap();
    assert_eq!(rule.rule_type, RuleType::Tagk);
    assert_eq!(rule.field.as_deref(), Some("host"));
    assert_eq!(rule.regex, None);
    assert_eq!(tree.rule(1, 0).unwrap().separator.as_deref(), Some("\\."));
    assert_eq!(client.transport().last_request().unwrap().param("treeId"), Some("1"));
}

#[test]
fn test_list_trees() {
    let client = stub_client();
    client.transport().push_json(200, json!([stored_tree()]));
    let trees = client.list_trees().unwrap();
    assert_eq!(trees.len(), 1);
    assert_eq!(trees[0].name.as_deref(), Some("Network"));
    assert!(client.transport().last_request().unwrap().query.is_empty());
}

// =============================================================================
// Rules
// =============================================================================

#[test]
fn test_rule_save_and_unchanged() {
    let client = stub_client();
    let mut rule = Rule::new(1, 1, 0, RuleType::Metric).with_separator("\\.");

    client.transport().push_json(
        200,
        json!({"treeId": 1, "level": 1, "order": 0, "type": "METRIC", "separator": "\\.",
               "description": "Split the metric", "regexGroupIdx": 0}),
    );
    rule.save_to(&client).unwrap();
    assert_eq!(rule.description.as_deref(), Some("Split the metric"));

    let body = client.transport().last_request().unwrap().body.unwrap();
    assert_eq!(body["type"], "METRIC");
    assert_eq!(body["treeId"], 1);
    assert!(body.get("regex").is_none());

    client.transport().push_empty(304);
    rule.save_to(&client).unwrap();
    assert_eq!(rule.description.as_deref(), Some("Split the metric"));
}

#[test]
fn test_custom_rule_requires_custom_field() {
    let client = stub_client();
    let mut rule = Rule::new(1, 0, 0, RuleType::TagkCustom).with_field("host");
    assert!(matches!(rule.save_to(&client), Err(Error::Validation(_))));
    assert_eq!(client.transport().request_count(), 0);
}

#[test]
fn test_delete_rules_requires_204() {
    let client = stub_client();
    client.transport().push_empty(204);
    client.delete_tree_rules(1).unwrap();
    assert_eq!(client.transport().last_request().unwrap().path, "/api/tree/rules");

    client.transport().push_empty(200);
    assert_eq!(client.delete_tree_rule(1, 0, 0).unwrap_err().status_code(), Some(200));
}

#[test]
fn test_collisions_and_test_requests() {
    let client = stub_client();
    client
        .transport()
        .push_json(200, json!({"010101": "AAAAAA", "020202": "BBBBBB"}));
    let collisions = client
        .tree_collisions(1, &["010101".to_string(), "020202".to_string()])
        .unwrap();
    assert_eq!(collisions.get("010101").map(String::as_str), Some("AAAAAA"));
    let request = client.transport().last_request().unwrap();
    assert_eq!(request.path, "/api/tree/collisions");
    assert_eq!(request.param("tsuids"), Some("010101,020202"));

    client.transport().push_json(200, json!({"mappings": {}}));
    client.test_tree(1, &[]).unwrap();
    assert_eq!(client.transport().last_request().unwrap().param("tsuids"), None);
}

// =============================================================================
// Branches
// =============================================================================

#[test]
fn test_recursive_branch_load() {
    let client = stub_client();
    client.transport().push_json(200, root_branch(1, "00010001"));
    client.transport().push_json(
        200,
        json!({
            "treeId": 1, "displayName": "sys", "branchId": "00010001", "depth": 1,
            "path": {"0": "ROOT", "1": "sys"},
            "leaves": [leaf("sys.cpu.0", "web01", "000001000001000001")],
            "branches": [{"treeId": 1, "displayName": "cpu", "branchId": "000100010002", "depth": 2}]
        }),
    );
    client.transport().push_json(
        200,
        json!({
            "treeId": 1, "displayName": "cpu", "branchId": "000100010002", "depth": 2,
            "path": {"0": "ROOT", "1": "sys", "2": "cpu"},
            "leaves": [leaf("sys.cpu.0", "web02", "000001000001000002"), leaf("sys.cpu.0", "web03", "000001000001000003")],
            "branches": null
        }),
    );

    let root = Branch::load_tree(&client, 1).unwrap();
    assert_eq!(root.branch_count(), 3);
    assert_eq!(root.leaf_count(), 3);
    let cpu = root.find("000100010002").unwrap();
    assert_eq!(cpu.display_name, "cpu");
    assert_eq!(cpu.leaves[1].display_name, "web03");
    assert_eq!(cpu.leaves[1].series.tsuid.as_deref(), Some("000001000001000003"));

    let requests = client.transport().requests();
    assert_eq!(requests[0].param("treeId"), Some("1"));
    assert_eq!(requests[1].param("branch"), Some("00010001"));
    assert_eq!(requests[2].param("branch"), Some("000100010002"));
    assert_eq!(client.transport().remaining(), 0);
}

#[test]
fn test_non_recursive_load_keeps_stubs() {
    let client = stub_client();
    client.transport().push_json(200, root_branch(1, "00010001"));
    let root = Branch::load(&client, BranchRef::Tree(1), false).unwrap();
    assert_eq!(root.branches.len(), 1);
    assert_eq!(client.transport().request_count(), 1);
}

#[test]
fn test_child_that_does_not_extend_parent() {
    let client = stub_client();
    client.transport().push_json(200, root_branch(1, "00020001"));
    let err = Branch::load_tree(&client, 1).unwrap_err();
    assert!(matches!(err, Error::ProtocolMismatch(_)));
    assert_eq!(client.transport().request_count(), 1);
}

#[test]
fn test_wrong_branch_returned() {
    let client = stub_client();
    client.transport().push_json(200, root_branch(1, "00010001"));
    client.transport().push_json(200, root_branch(1, "00010001"));
    assert!(matches!(Branch::load_tree(&client, 1), Err(Error::ProtocolMismatch(_))));
}
