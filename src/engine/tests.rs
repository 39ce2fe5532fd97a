//! Tests for the stream graph and scheduler

use super::*;
use crate::catalog::Selection;
use crate::config::EngineSettings;
use crate::http::{HttpClient, HttpClientConfig, RetryPolicy, Transport};
use crate::output::{Emitter, MemoryEmitter};
use crate::pagination::PaginationConfig;
use crate::schema::{JsonType, RecordSchema, SchemaProperty};
use crate::state::BookmarkStore;
use crate::stream::Transform;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn schema(cursor: Option<&str>) -> RecordSchema {
    let schema = RecordSchema::new()
        .property("id", SchemaProperty::new(JsonType::Integer))
        .property("project_id", SchemaProperty::nullable(JsonType::Integer))
        .property("iid", SchemaProperty::nullable(JsonType::Integer))
        .property("name", SchemaProperty::nullable(JsonType::String));
    match cursor {
        Some(field) => schema.property(
            field,
            SchemaProperty::nullable(JsonType::String).with_format("date-time"),
        ),
        None => schema,
    }
}

fn projects(ids: &[&str]) -> StreamDefinition {
    StreamDefinition::new("projects", "/projects/{{ partition.id }}")
        .schema(schema(None))
        .key_properties(&["id"])
        .partitions(ids.iter().map(|s| s.to_string()).collect())
        .key("project_{{ partition.id }}")
        .pagination(PaginationConfig::None)
}

fn issues() -> StreamDefinition {
    StreamDefinition::new("issues", "/projects/{{ partition.id }}/issues")
        .schema(schema(Some("updated_at")))
        .key_properties(&["id"])
        .server_side("updated_at", "updated_after")
        .parent("projects", "id")
        .key("project_{{ partition.id }}_issues")
        .transform(Transform::partition_field("id", "project_id"))
}

fn commits() -> StreamDefinition {
    StreamDefinition::new("commits", "/projects/{{ partition.id }}/repository/commits")
        .schema(schema(Some("created_at")))
        .key_properties(&["id"])
        .server_side("created_at", "since")
        .parent("projects", "id")
        .key("project_{{ partition.id }}_commits")
}

fn issue_notes() -> StreamDefinition {
    StreamDefinition::new(
        "issue_notes",
        "/projects/{{ partition.project_id }}/issues/{{ partition.iid }}/notes",
    )
    .schema(schema(Some("updated_at")))
    .key_properties(&["id"])
    .client_side("updated_at", false)
    .parent("issues", "id")
    .key("project_{{ partition.project_id }}_issue_{{ partition.iid }}_notes")
}

fn page(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(body)
        .insert_header("X-Next-Page", "")
}

struct Harness {
    server: MockServer,
    emitter: Arc<MemoryEmitter>,
    bookmarks: BookmarkStore,
}

impl Harness {
    async fn new() -> Self {
        Self {
            server: MockServer::start().await,
            emitter: Arc::new(MemoryEmitter::new()),
            bookmarks: BookmarkStore::in_memory(),
        }
    }

    fn ctx(&self) -> SyncContext {
        let config = HttpClientConfig::builder().no_rate_limit().build();
        let transport: Arc<dyn Transport> = Arc::new(HttpClient::with_config(config).unwrap());
        let emitter: Arc<dyn Emitter> = self.emitter.clone();
        let settings = EngineSettings {
            max_workers: 4,
            ..EngineSettings::default()
        };
        SyncContext::new(
            transport,
            emitter,
            self.bookmarks.clone(),
            format!("{}/api/v4", self.server.uri()),
        )
        .with_settings(settings)
        .with_retry(RetryPolicy::new(
            2,
            Duration::from_millis(1),
            Duration::from_millis(5),
        ))
    }

    fn engine(&self, defs: Vec<StreamDefinition>, ctx: SyncContext) -> SyncEngine {
        SyncEngine::new(StreamGraph::new(defs).unwrap(), ctx)
    }

    async fn mount_project(&self, id: i64) {
        Mock::given(method("GET"))
            .and(path(format!("/api/v4/projects/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": id, "name": "p"})))
            .mount(&self.server)
            .await;
    }
}

// ============================================================================
// Graph Tests
// ============================================================================

#[test]
fn test_graph_levels() {
    let graph = StreamGraph::new(vec![issue_notes(), issues(), projects(&["1"]), commits()])
        .unwrap();

    assert_eq!(graph.len(), 4);
    assert_eq!(
        graph.levels(),
        &[
            vec!["projects".to_string()],
            vec!["issues".to_string(), "commits".to_string()],
            vec!["issue_notes".to_string()],
        ]
    );
    assert_eq!(graph.children("projects"), vec!["issues", "commits"]);
    assert_eq!(
        graph.ancestors("issue_notes").into_iter().collect::<Vec<_>>(),
        vec!["issues", "projects"]
    );
}

#[test]
fn test_graph_rejects_duplicates() {
    let err = StreamGraph::new(vec![projects(&[]), projects(&[])]).unwrap_err();
    assert!(matches!(err, Error::DuplicateStream { stream } if stream == "projects"));
}

#[test]
fn test_graph_rejects_unknown_parent() {
    let err = StreamGraph::new(vec![issues()]).unwrap_err();
    assert!(matches!(
        err,
        Error::UnknownParent { stream, parent } if stream == "issues" && parent == "projects"
    ));
}

#[test]
fn test_graph_rejects_cycle() {
    let a = StreamDefinition::new("a", "/a").parent("b", "id");
    let b = StreamDefinition::new("b", "/b").parent("a", "id");
    let err = StreamGraph::new(vec![projects(&[]), a, b]).unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));
}

#[test]
fn test_plan_includes_ancestors() {
    let graph =
        StreamGraph::new(vec![projects(&["1"]), issues(), issue_notes(), commits()]).unwrap();

    let plan = graph.plan(&Selection::streams(["issue_notes"]));
    assert_eq!(
        plan.into_iter().collect::<Vec<_>>(),
        vec!["issue_notes", "issues", "projects"]
    );
    assert_eq!(graph.plan(&Selection::all()).len(), 4);
}

// ============================================================================
// Stats Tests
// ============================================================================

#[test]
fn test_sync_stats() {
    let mut stats = SyncStats::new();
    stats.add_failure();
    stats.set_duration(12);
    assert_eq!(stats.instances_failed, 1);
    assert_eq!(stats.duration_ms, 12);
    assert_eq!(stats.records_synced, 0);
}

// ============================================================================
// Scheduler Tests
// ============================================================================

#[tokio::test]
async fn test_partitions_are_isolated() {
    let h = Harness::new().await;
    h.mount_project(1).await;
    h.mount_project(2).await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/1/issues"))
        .respond_with(page(json!([
            {"id": 11, "updated_at": "2021-03-01T00:00:00Z"},
            {"id": 12, "updated_at": "2021-05-01T00:00:00Z"}
        ])))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/2/issues"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&h.server)
        .await;

    let engine = h.engine(vec![projects(&["1", "2"]), issues()], h.ctx());
    let report = engine.run().await.unwrap();

    assert_eq!(report.status("project_1"), Some(StreamStatus::Completed));
    assert_eq!(report.status("project_1_issues"), Some(StreamStatus::Completed));
    assert_eq!(report.status("project_2_issues"), Some(StreamStatus::Skipped));
    assert_eq!(report.stats.instances_skipped, 1);

    // Records carry their own partition only
    let records = h.emitter.records_for_key("project_1_issues");
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r["project_id"] == json!(1)));
    assert!(h.emitter.records_for_key("project_2_issues").is_empty());

    let state = h.emitter.last_state().unwrap();
    assert_eq!(state["project_1_issues"], "2021-05-01T00:00:00Z");
    assert!(state.get("project_2_issues").is_none());
}

#[tokio::test]
async fn test_fatal_error_keeps_earned_bookmarks() {
    let h = Harness::new().await;
    h.mount_project(9).await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/9/repository/commits"))
        .respond_with(page(json!([{"id": 1, "created_at": "2022-02-02T00:00:00Z"}])))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/9/issues"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string("bad request")
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&h.server)
        .await;

    let engine = h.engine(vec![projects(&["9"]), issues(), commits()], h.ctx());
    let err = engine.run().await.unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 400, .. }));
    assert!(engine.context().cancel.is_cancelled());

    let state = h.emitter.last_state().unwrap();
    assert_eq!(state["project_9_commits"], "2022-02-02T00:00:00Z");
    assert!(state.get("project_9_issues").is_none());
    assert_eq!(
        h.bookmarks.get("project_9_commits").await.as_deref(),
        Some("2022-02-02T00:00:00Z")
    );
}

#[tokio::test]
async fn test_resumed_run_uses_bookmark() {
    let h = Harness::new().await;
    h.mount_project(3).await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/3/issues"))
        .and(query_param("updated_after", "2021-04-01T00:00:00Z"))
        .respond_with(page(json!([
            {"id": 32, "updated_at": "2021-04-01T00:00:00Z"}
        ])))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/3/issues"))
        .respond_with(page(json!([
            {"id": 31, "updated_at": "2021-02-01T00:00:00Z"},
            {"id": 32, "updated_at": "2021-04-01T00:00:00Z"}
        ])))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;

    let defs = || vec![projects(&["3"]), issues()];
    h.engine(defs(), h.ctx()).run().await.unwrap();
    let first = h.emitter.records_for_key("project_3_issues");
    assert_eq!(first.len(), 2);

    // Second run against the same store starts from the stored bookmark
    let emitter = Arc::new(MemoryEmitter::new());
    let ctx = SyncContext {
        emitter: emitter.clone(),
        ..h.ctx()
    };
    h.engine(defs(), ctx).run().await.unwrap();

    let second = emitter.records_for_key("project_3_issues");
    assert_eq!(second.len(), 1);
    assert!(second.iter().all(|r| first.contains(r)));
    assert_eq!(
        h.bookmarks.get("project_3_issues").await.as_deref(),
        Some("2021-04-01T00:00:00Z")
    );
}

#[tokio::test]
async fn test_skipped_parent_skips_children() {
    let h = Harness::new().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/7"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/7/issues"))
        .respond_with(page(json!([])))
        .expect(0)
        .mount(&h.server)
        .await;

    let engine = h.engine(vec![projects(&["7"]), issues(), issue_notes()], h.ctx());
    let report = engine.run().await.unwrap();

    assert_eq!(report.status("project_7"), Some(StreamStatus::Skipped));
    assert_eq!(report.status("project_7_issues"), Some(StreamStatus::Skipped));
    // Grandchild keys need issue fields, so no notes instance exists at all
    assert_eq!(report.outcomes_for("issue_notes").count(), 0);
    assert_eq!(report.stats.instances_skipped, 2);
    assert_eq!(report.stats.instances_failed, 0);
}

#[tokio::test]
async fn test_unselected_ancestor_runs_silently() {
    let h = Harness::new().await;
    h.mount_project(4).await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/4/issues"))
        .respond_with(page(json!([
            {"id": 41, "iid": 1, "updated_at": "2021-01-01T00:00:00Z"},
            {"id": 42, "iid": 2, "updated_at": "2021-01-02T00:00:00Z"}
        ])))
        .mount(&h.server)
        .await;
    for iid in [1, 2] {
        Mock::given(method("GET"))
            .and(path(format!("/api/v4/projects/4/issues/{iid}/notes")))
            .respond_with(page(json!([
                {"id": 100 + iid, "updated_at": "2021-01-05T00:00:00Z"}
            ])))
            .expect(1)
            .mount(&h.server)
            .await;
    }

    let ctx = h
        .ctx()
        .with_selection(Selection::streams(["issue_notes"]));
    let engine = h.engine(vec![projects(&["4"]), issues(), issue_notes()], ctx);
    let report = engine.run().await.unwrap();

    assert_eq!(h.emitter.schema_streams(), vec!["issue_notes"]);
    assert!(h.emitter.records("projects").is_empty());
    assert!(h.emitter.records("issues").is_empty());
    assert_eq!(h.emitter.records("issue_notes").len(), 2);
    assert_eq!(report.stats.records_synced, 2);

    // Ancestors ran for their records only; their bookmarks stay untouched
    assert_eq!(report.status("project_4_issues"), Some(StreamStatus::Completed));
    assert_eq!(h.bookmarks.get("project_4_issues").await, None);
    assert_eq!(
        h.bookmarks.get("project_4_issue_1_notes").await.as_deref(),
        Some("2021-01-05T00:00:00Z")
    );
}

#[tokio::test]
async fn test_duplicate_partition_keys_run_once() {
    let h = Harness::new().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5})))
        .expect(1)
        .mount(&h.server)
        .await;

    let engine = h.engine(vec![projects(&["5", " 5 ", "5"])], h.ctx());
    let report = engine.run().await.unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.stats.records_synced, 1);
}

#[tokio::test]
async fn test_cancelled_run_returns_error() {
    let h = Harness::new().await;
    let ctx = h.ctx();
    ctx.cancel.cancel();

    let engine = h.engine(vec![projects(&["1"])], ctx);
    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(h.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unconfigured_root_has_no_instances() {
    let h = Harness::new().await;
    let engine = h.engine(vec![projects(&[]), issues()], h.ctx());
    let report = engine.run().await.unwrap();

    assert!(report.outcomes.is_empty());
    assert_eq!(h.emitter.schema_streams(), vec!["projects", "issues"]);
    assert!(h.server.received_requests().await.unwrap().is_empty());
}

fn groups(ids: &[&str]) -> StreamDefinition {
    StreamDefinition::new("groups", "/groups/{{ partition.id }}")
        .schema(schema(None))
        .key_properties(&["id"])
        .partitions(ids.iter().map(|s| s.to_string()).collect())
        .key("group_{{ partition.id }}")
        .pagination(PaginationConfig::None)
}

fn group_projects() -> StreamDefinition {
    StreamDefinition::new("projects", "/projects/{{ partition.id }}")
        .schema(schema(None))
        .key_properties(&["id"])
        .parent("groups", "projects.id")
        .key("project_{{ partition.id }}")
        .pagination(PaginationConfig::None)
}

fn tags() -> StreamDefinition {
    StreamDefinition::new("tags", "/projects/{{ partition.id }}/repository/tags")
        .schema(schema(None))
        .key_properties(&["name"])
        .parent("projects", "id")
        .key("project_{{ partition.id }}_tags")
}

#[tokio::test]
async fn test_skipped_group_does_not_invent_project_keys() {
    let h = Harness::new().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/groups/55"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&h.server)
        .await;

    let engine = h.engine(vec![groups(&["55"]), group_projects(), tags()], h.ctx());
    let report = engine.run().await.unwrap();

    assert_eq!(report.status("group_55"), Some(StreamStatus::Skipped));
    // The group id is not a project id
    assert_eq!(report.status("project_55"), None);
    assert_eq!(report.status("project_55_tags"), None);
    assert_eq!(report.outcomes_for("projects").count(), 0);
    assert_eq!(report.stats.instances_skipped, 1);
    assert_eq!(h.server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_skipped_discovered_project_skips_its_children() {
    let h = Harness::new().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/groups/3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 3, "projects": [{"id": 30}, {"id": 31}]})),
        )
        .mount(&h.server)
        .await;
    h.mount_project(30).await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/31"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/30/repository/tags"))
        .respond_with(page(json!([{"name": "v1"}])))
        .mount(&h.server)
        .await;

    let engine = h.engine(vec![groups(&["3"]), group_projects(), tags()], h.ctx());
    let report = engine.run().await.unwrap();

    assert_eq!(report.status("project_30_tags"), Some(StreamStatus::Completed));
    assert_eq!(report.status("project_31"), Some(StreamStatus::Skipped));
    assert_eq!(report.status("project_31_tags"), Some(StreamStatus::Skipped));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_instances_share_state_file() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");

    let ids: Vec<String> = (1..=30).map(|id| id.to_string()).collect();
    for id in 1..=30i64 {
        Mock::given(method("GET"))
            .and(path(format!("/api/v4/projects/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": id})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/api/v4/projects/{id}/issues")))
            .respond_with(page(json!([
                {"id": id * 100, "updated_at": format!("2021-02-{:02}T00:00:00Z", id % 28 + 1)}
            ])))
            .mount(&server)
            .await;
    }

    let emitter = Arc::new(MemoryEmitter::new());
    let bookmarks = BookmarkStore::from_file(&state_path).unwrap();
    let config = HttpClientConfig::builder().no_rate_limit().build();
    let transport: Arc<dyn Transport> = Arc::new(HttpClient::with_config(config).unwrap());
    let ctx = SyncContext::new(
        transport,
        emitter.clone(),
        bookmarks.clone(),
        format!("{}/api/v4", server.uri()),
    )
    .with_settings(EngineSettings {
        max_workers: 8,
        ..EngineSettings::default()
    });

    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let engine = SyncEngine::new(
        StreamGraph::new(vec![projects(&id_refs), issues()]).unwrap(),
        ctx,
    );
    let report = engine.run().await.unwrap();
    assert_eq!(report.stats.instances_completed, 60);

    // The file holds the last emitted snapshot with every instance bookmark
    let on_disk = BookmarkStore::from_file(&state_path).unwrap().snapshot().await;
    assert_eq!(on_disk.len(), 30);
    assert_eq!(
        serde_json::to_value(&on_disk).unwrap(),
        emitter.last_state().unwrap()
    );
    assert!(emitter
        .states()
        .windows(2)
        .all(|pair| pair[0].as_object().map_or(0, |m| m.len())
            <= pair[1].as_object().map_or(0, |m| m.len())));
}
