//! Tests for partition module

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// PartitionValue Tests
// ============================================================================

#[test]
fn test_partition_value_new() {
    let pv = PartitionValue::new("42");
    assert_eq!(pv.id, "42");
    assert!(pv.values.is_empty());
}

#[test]
fn test_partition_value_with_value() {
    let pv = PartitionValue::new("42")
        .with_value("path", "group/project")
        .with_value("id", 42);

    assert_eq!(pv.get("id"), Some(&json!(42)));
    assert_eq!(pv.get_string("path"), Some("group/project"));
    assert_eq!(pv.to_value(), json!({"path": "group/project", "id": 42}));
}

// ============================================================================
// ListRouter Tests
// ============================================================================

#[test]
fn test_list_router_numeric_and_path_ids() {
    let router = ListRouter::new(
        vec!["42".to_string(), "group/project".to_string()],
        "id",
    );
    let partitions = router.partitions().unwrap();

    assert_eq!(partitions.len(), 2);
    assert_eq!(partitions[0].id, "42");
    assert_eq!(partitions[0].get("id"), Some(&json!(42)));
    assert_eq!(partitions[1].get("id"), Some(&json!("group/project")));
    assert_eq!(router.partition_field(), "id");
}

#[test]
fn test_list_router_skips_blank_and_duplicates() {
    let router = ListRouter::new(
        vec!["1".to_string(), " ".to_string(), "1".to_string(), "2".to_string()],
        "id",
    );
    let ids: Vec<String> = router
        .partitions()
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[test]
fn test_list_router_empty() {
    let router = ListRouter::new(vec![], "id");
    assert!(router.partitions().unwrap().is_empty());
}

// ============================================================================
// ParentRouter Tests
// ============================================================================

#[test]
fn test_parent_router_carries_record() {
    let records = vec![
        json!({"id": 7, "iid": 1, "project_id": 42}),
        json!({"id": 8, "iid": 2, "project_id": 42}),
    ];
    let router = ParentRouter::new(records, "id");
    let partitions = router.partitions().unwrap();

    assert_eq!(partitions.len(), 2);
    assert_eq!(partitions[0].id, "7");
    assert_eq!(partitions[1].get("iid"), Some(&json!(2)));
    assert_eq!(partitions[1].get("project_id"), Some(&json!(42)));
}

#[test]
fn test_parent_router_crosses_arrays() {
    let groups = vec![json!({
        "id": 3,
        "full_path": "acme",
        "projects": [
            {"id": 10, "path_with_namespace": "acme/api"},
            {"id": 11, "path_with_namespace": "acme/web"}
        ]
    })];
    let router = ParentRouter::new(groups, "projects.id");
    let partitions = router.partitions().unwrap();

    assert_eq!(partitions.len(), 2);
    assert_eq!(partitions[0].id, "10");
    assert_eq!(
        partitions[1].get_string("path_with_namespace"),
        Some("acme/web")
    );
    assert_eq!(router.partition_field(), "projects.id");
}

#[test]
fn test_parent_router_deduplicates() {
    let records = vec![
        json!({"projects": [{"id": 10}]}),
        json!({"projects": [{"id": 10}, {"id": 12}]}),
    ];
    let router = ParentRouter::new(records, "projects.id");
    let ids: Vec<String> = router
        .partitions()
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec!["10", "12"]);
}

#[test]
fn test_parent_router_missing_key() {
    let records = vec![json!({"name": "no id"}), json!({"id": null}), json!({"id": "x"})];
    let router = ParentRouter::new(records, "id");
    let partitions = router.partitions().unwrap();

    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].id, "x");
}

#[test]
fn test_parent_router_without_records() {
    assert!(ParentRouter::new(Vec::new(), "id")
        .partitions()
        .unwrap()
        .is_empty());
}

// ============================================================================
// extract_json_path Tests
// ============================================================================

#[test]
fn test_extract_json_path_nested() {
    let value = json!({"time_stats": {"time_estimate": 3600}});
    assert_eq!(
        extract_json_path(&value, "time_stats.time_estimate"),
        Some(json!(3600))
    );
    assert_eq!(
        extract_json_path(&value, "$.time_stats.time_estimate"),
        Some(json!(3600))
    );
}

#[test]
fn test_extract_json_path_array_index() {
    let value = json!({"assignees": [{"id": 1}, {"id": 2}]});
    assert_eq!(extract_json_path(&value, "assignees[1].id"), Some(json!(2)));
    assert_eq!(extract_json_path(&value, "assignees[5].id"), None);
}

#[test]
fn test_extract_json_path_missing() {
    let value = json!({"author": null});
    assert_eq!(extract_json_path(&value, "author.id"), None);
    assert_eq!(extract_json_path(&value, "missing"), None);
}
