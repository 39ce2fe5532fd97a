//! Tests for output module

use super::*;
use crate::schema::{JsonType, RecordSchema, SchemaProperty};
use crate::state::BookmarkDocument;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn record(value: Value) -> crate::types::JsonObject {
    value.as_object().cloned().unwrap()
}

fn lines(emitter: JsonLinesEmitter<Vec<u8>>) -> Vec<Value> {
    let bytes = emitter.into_inner().unwrap();
    String::from_utf8(bytes)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

// ============================================================================
// Message Tests
// ============================================================================

#[test]
fn test_record_message_layout() {
    let msg = Message::record("issues", "project_1_issues", record(json!({"id": 1})));
    let value: Value = serde_json::from_str(&msg.to_line().unwrap()).unwrap();

    assert_eq!(value["type"], "RECORD");
    assert_eq!(value["stream"], "issues");
    assert_eq!(value["record"], json!({"id": 1}));
    assert!(value["time_extracted"].is_string());
    // The stream key stays in memory only
    assert!(value.get("key").is_none());
}

#[test]
fn test_schema_message_layout() {
    let schema = RecordSchema::new().property("id", SchemaProperty::new(JsonType::Integer));
    let msg = Message::schema("issues", &schema, &["id".to_string()], Some("updated_at"));
    let value: Value = serde_json::to_value(&msg).unwrap();

    assert_eq!(value["type"], "SCHEMA");
    assert_eq!(value["key_properties"], json!(["id"]));
    assert_eq!(value["bookmark_properties"], json!(["updated_at"]));
    assert_eq!(value["schema"]["properties"]["id"]["type"], "integer");

    let msg = Message::schema("branches", &schema, &[], None);
    let value: Value = serde_json::to_value(&msg).unwrap();
    assert!(value.get("bookmark_properties").is_none());
}

#[test]
fn test_state_message_layout() {
    let msg = Message::state(json!({"project_1_issues": "2021-01-01T00:00:00Z"}));
    assert_eq!(
        msg.to_line().unwrap(),
        r#"{"type":"STATE","value":{"project_1_issues":"2021-01-01T00:00:00Z"}}"#
    );
    assert!(msg.is_state());
    assert_eq!(msg.stream(), None);
}

// ============================================================================
// Emitter Tests
// ============================================================================

#[test]
fn test_json_lines_emitter_preserves_order() {
    let emitter = JsonLinesEmitter::new(Vec::new());
    emitter
        .emit_record("issues", "project_1_issues", record(json!({"id": 1})))
        .unwrap();
    emitter
        .emit_record("issues", "project_1_issues", record(json!({"id": 2})))
        .unwrap();

    let mut doc = BookmarkDocument::new();
    doc.insert("project_1_issues", "2021-01-01T00:00:00Z");
    emitter.emit_bookmark_snapshot(&doc).unwrap();

    let out = lines(emitter);
    assert_eq!(out.len(), 3);
    assert_eq!(out[0]["record"]["id"], 1);
    assert_eq!(out[1]["record"]["id"], 2);
    assert_eq!(out[2]["value"]["project_1_issues"], "2021-01-01T00:00:00Z");
}

#[test]
fn test_memory_emitter_filters() {
    let emitter = MemoryEmitter::new();
    emitter
        .emit_schema("issues", &RecordSchema::new(), &["id".to_string()], None)
        .unwrap();
    emitter
        .emit_record("issues", "project_1_issues", record(json!({"id": 1})))
        .unwrap();
    emitter
        .emit_record("issues", "project_2_issues", record(json!({"id": 2})))
        .unwrap();
    emitter
        .emit_record("branches", "project_1_branches", record(json!({"name": "main"})))
        .unwrap();
    emitter.emit(Message::state(json!({"a": "1"}))).unwrap();
    emitter.emit(Message::state(json!({"a": "2"}))).unwrap();

    assert_eq!(emitter.messages().len(), 6);
    assert_eq!(emitter.records("issues").len(), 2);
    assert_eq!(
        emitter.records_for_key("project_2_issues"),
        vec![record(json!({"id": 2}))]
    );
    assert_eq!(emitter.schema_streams(), vec!["issues"]);
    assert_eq!(emitter.states().len(), 2);
    assert_eq!(emitter.last_state(), Some(json!({"a": "2"})));
}

#[test]
fn test_emitters_are_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<MemoryEmitter>();
    assert_send_sync::<JsonLinesEmitter<std::io::Stdout>>();
}
