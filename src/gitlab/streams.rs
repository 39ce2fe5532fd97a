//! GitLab stream definitions
//!
//! Streams hang off two roots: `groups` (configured group ids) and `projects`
//! (configured project ids, or every project of the fetched groups). Child
//! streams receive the materialized parent record as their partition, so a
//! project child renders `{{ partition.id }}` as the project id and a note
//! stream renders `{{ partition.project_id }}` and `{{ partition.iid }}` from
//! its issue.

use super::schemas;
use crate::config::TapConfig;
use crate::pagination::{PaginationConfig, ResponseFormat};
use crate::stream::{StreamDefinition, Transform};

/// Every stream the tap knows, in declaration order
pub const STREAM_NAMES: &[&str] = &[
    "groups",
    "projects",
    "site_users",
    "branches",
    "commits",
    "issues",
    "issue_notes",
    "merge_requests",
    "merge_request_notes",
    "merge_request_commits",
    "project_milestones",
    "project_members",
    "users",
    "project_labels",
    "languages",
    "readme",
    "releases",
    "tags",
    "pipelines",
    "pipelines_extended",
    "jobs",
    "bridges",
    "vulnerabilities",
    "project_variables",
    "group_projects",
    "group_milestones",
    "group_members",
    "group_labels",
    "epics",
    "epic_issues",
    "group_variables",
];

/// Streams that require a GitLab Ultimate license
const ULTIMATE_STREAMS: &[&str] = &["epics", "epic_issues", "vulnerabilities"];

/// Labels endpoints time out with large pages
const LABELS_PAGE_SIZE: u32 = 20;

const TIME_STATS: &[&str] = &[
    "time_estimate",
    "total_time_spent",
    "human_time_estimate",
    "human_total_time_spent",
];

/// Whether a stream is available under the given configuration
pub fn is_enabled(name: &str, config: &TapConfig) -> bool {
    if ULTIMATE_STREAMS.contains(&name) {
        return config.ultimate_license;
    }
    match name {
        "merge_request_commits" => config.fetch_merge_request_commits,
        "pipelines_extended" => config.fetch_pipelines_extended,
        "bridges" => config.fetch_bridges,
        "project_variables" => config.fetch_project_variables,
        "group_variables" => config.fetch_group_variables,
        "site_users" => config.fetch_site_users,
        _ => true,
    }
}

/// Build every stream definition for a configuration
pub fn definitions(config: &TapConfig) -> Vec<StreamDefinition> {
    vec![
        groups(config),
        projects(config),
        site_users(),
        branches(),
        commits(),
        issues(),
        issue_notes(),
        merge_requests(),
        merge_request_notes(),
        merge_request_commits(),
        project_milestones(),
        project_members(),
        users(),
        project_labels(),
        languages(),
        readme(),
        releases(),
        tags(),
        pipelines(),
        pipelines_extended(),
        jobs(),
        bridges(),
        vulnerabilities(),
        project_variables(),
        group_projects(),
        group_milestones(),
        group_members(),
        group_labels(),
        epics(),
        epic_issues(),
        group_variables(),
    ]
}

// ============================================================================
// Roots
// ============================================================================

fn groups(config: &TapConfig) -> StreamDefinition {
    StreamDefinition::new("groups", "/groups/{{ partition.id }}")
        .schema(schemas::groups())
        .key_properties(&["id"])
        .partitions(config.groups.clone())
        .key("group_{{ partition.id }}")
        .pagination(PaginationConfig::None)
}

fn projects(config: &TapConfig) -> StreamDefinition {
    let def = StreamDefinition::new("projects", "/projects/{{ partition.id }}")
        .query("statistics", "1")
        .schema(schemas::projects())
        .key_properties(&["id"])
        .key("project_{{ partition.id }}")
        .pagination(PaginationConfig::None)
        .transform(Transform::flatten_id("owner"));

    if config.projects.is_empty() {
        def.parent("groups", "projects.id")
    } else {
        def.partitions(config.projects.clone())
    }
}

fn site_users() -> StreamDefinition {
    StreamDefinition::new("site_users", "/users")
        .schema(schemas::users())
        .key_properties(&["id"])
}

// ============================================================================
// Project children
// ============================================================================

fn project_child(name: &str, path: &str) -> StreamDefinition {
    StreamDefinition::new(name, format!("/projects/{{{{ partition.id }}}}{path}"))
        .parent("projects", "id")
        .key(&format!("project_{{{{ partition.id }}}}_{name}"))
        .transform(Transform::partition_field("id", "project_id"))
}

fn branches() -> StreamDefinition {
    project_child("branches", "/repository/branches")
        .schema(schemas::branches())
        .key_properties(&["project_id", "name"])
        .transform(Transform::flatten_id("commit"))
}

fn commits() -> StreamDefinition {
    project_child("commits", "/repository/commits")
        .query("with_stats", "true")
        .schema(schemas::commits())
        .key_properties(&["id"])
        .server_side("created_at", "since")
}

fn issues() -> StreamDefinition {
    project_child("issues", "/issues")
        .query("scope", "all")
        .query("order_by", "updated_at")
        .query("sort", "asc")
        .schema(schemas::issues())
        .key_properties(&["id"])
        .server_side("updated_at", "updated_after")
        .sorted()
        .transform(Transform::flatten_id("author"))
        .transform(Transform::flatten_id("assignee"))
        .transform(Transform::flatten_id("epic"))
        .transform(Transform::flatten_id("closed_by"))
        .transform(Transform::flatten_id("milestone"))
        .transform(Transform::id_array("assignees"))
        .transform(Transform::hoist("time_stats", TIME_STATS))
}

fn merge_requests() -> StreamDefinition {
    project_child("merge_requests", "/merge_requests")
        .query("scope", "all")
        .query("order_by", "updated_at")
        .query("sort", "asc")
        .schema(schemas::merge_requests())
        .key_properties(&["id"])
        .server_side("updated_at", "updated_after")
        .sorted()
        .transform(Transform::flatten_id("author"))
        .transform(Transform::flatten_id("assignee"))
        .transform(Transform::flatten_id("milestone"))
        .transform(Transform::flatten_id("merged_by"))
        .transform(Transform::flatten_id("closed_by"))
        .transform(Transform::id_array("assignees"))
        .transform(Transform::id_array("reviewers"))
        .transform(Transform::hoist("time_stats", TIME_STATS))
}

/// Notes come newest first, so paging stops at the first page ending before the bound
fn notes(name: &str, parent: &str, noteable: &str) -> StreamDefinition {
    StreamDefinition::new(
        name,
        format!("/projects/{{{{ partition.project_id }}}}/{noteable}s/{{{{ partition.iid }}}}/notes"),
    )
    .query("order_by", "updated_at")
    .query("sort", "desc")
    .schema(schemas::notes())
    .key_properties(&["id"])
    .client_side("updated_at", true)
    .parent(parent, "id")
    .key(&format!(
        "project_{{{{ partition.project_id }}}}_{noteable}_{{{{ partition.iid }}}}_notes"
    ))
    .transform(Transform::flatten_id("author"))
    .transform(Transform::partition_field("project_id", "project_id"))
}

fn issue_notes() -> StreamDefinition {
    notes("issue_notes", "issues", "issue")
}

fn merge_request_notes() -> StreamDefinition {
    notes("merge_request_notes", "merge_requests", "merge_request")
}

fn merge_request_commits() -> StreamDefinition {
    StreamDefinition::new(
        "merge_request_commits",
        "/projects/{{ partition.project_id }}/merge_requests/{{ partition.iid }}/commits",
    )
    .schema(schemas::merge_request_commits())
    .key_properties(&["project_id", "merge_request_iid", "commit_id"])
    .parent("merge_requests", "id")
    .key("project_{{ partition.project_id }}_merge_request_{{ partition.iid }}_commits")
    .transform(Transform::partition_field("project_id", "project_id"))
    .transform(Transform::partition_field("iid", "merge_request_iid"))
    .transform(Transform::copy("id", "commit_id"))
    .transform(Transform::copy("short_id", "commit_short_id"))
}

fn project_milestones() -> StreamDefinition {
    project_child("project_milestones", "/milestones")
        .schema(schemas::milestones())
        .key_properties(&["id"])
}

fn project_members() -> StreamDefinition {
    project_child("project_members", "/members")
        .schema(schemas::project_members())
        .key_properties(&["project_id", "id"])
        .transform(Transform::copy("id", "user_id"))
}

fn users() -> StreamDefinition {
    project_child("users", "/users")
        .schema(schemas::users())
        .key_properties(&["id"])
}

fn project_labels() -> StreamDefinition {
    project_child("project_labels", "/labels")
        .schema(schemas::project_labels())
        .key_properties(&["project_id", "id"])
        .pagination(PaginationConfig::fixed_page_size(LABELS_PAGE_SIZE))
}

fn languages() -> StreamDefinition {
    project_child("languages", "/languages")
        .schema(schemas::languages())
        .key_properties(&["project_id", "language_name"])
        .pagination(PaginationConfig::None)
        .format(ResponseFormat::key_value("language_name", "percent"))
}

/// README of the default branch, as raw text
fn readme() -> StreamDefinition {
    project_child("readme", "/repository/files/README%2Emd/raw")
        .schema(schemas::readme())
        .key_properties(&["project_id"])
        .pagination(PaginationConfig::None)
        .format(ResponseFormat::raw("content"))
}

fn releases() -> StreamDefinition {
    project_child("releases", "/releases")
        .schema(schemas::releases())
        .key_properties(&["project_id", "commit_id", "tag_name"])
        .transform(Transform::flatten_id("author"))
        .transform(Transform::flatten_id("commit"))
}

fn tags() -> StreamDefinition {
    project_child("tags", "/repository/tags")
        .schema(schemas::tags())
        .key_properties(&["project_id", "commit_id", "name"])
        .transform(Transform::flatten_id("commit"))
}

fn pipelines() -> StreamDefinition {
    project_child("pipelines", "/pipelines")
        .query("order_by", "updated_at")
        .query("sort", "asc")
        .schema(schemas::pipelines())
        .key_properties(&["id"])
        .server_side("updated_at", "updated_after")
        .sorted()
}

fn pipelines_extended() -> StreamDefinition {
    StreamDefinition::new(
        "pipelines_extended",
        "/projects/{{ partition.project_id }}/pipelines/{{ partition.id }}",
    )
    .schema(schemas::pipelines_extended())
    .key_properties(&["id"])
    .parent("pipelines", "id")
    .key("project_{{ partition.project_id }}_pipeline_{{ partition.id }}_extended")
    .pagination(PaginationConfig::None)
    .transform(Transform::partition_field("project_id", "project_id"))
}

fn jobs() -> StreamDefinition {
    StreamDefinition::new(
        "jobs",
        "/projects/{{ partition.project_id }}/pipelines/{{ partition.id }}/jobs",
    )
    .query("include_retried", "true")
    .schema(schemas::jobs())
    .key_properties(&["id"])
    .parent("pipelines", "id")
    .key("project_{{ partition.project_id }}_pipeline_{{ partition.id }}_jobs")
    .transform(Transform::partition_field("project_id", "project_id"))
    .transform(Transform::flatten_id("user"))
    .transform(Transform::flatten_id("commit"))
    .transform(Transform::flatten_id("pipeline"))
    .transform(Transform::flatten_id("runner"))
}

fn bridges() -> StreamDefinition {
    StreamDefinition::new(
        "bridges",
        "/projects/{{ partition.project_id }}/pipelines/{{ partition.id }}/bridges",
    )
    .schema(schemas::bridges())
    .key_properties(&["id"])
    .parent("pipelines", "id")
    .key("project_{{ partition.project_id }}_pipeline_{{ partition.id }}_bridges")
    .transform(Transform::partition_field("project_id", "project_id"))
    .transform(Transform::flatten_id("user"))
    .transform(Transform::flatten_id("commit"))
    .transform(Transform::flatten_id("pipeline"))
}

fn vulnerabilities() -> StreamDefinition {
    project_child("vulnerabilities", "/vulnerabilities")
        .schema(schemas::vulnerabilities())
        .key_properties(&["id"])
        .transform(Transform::flatten_id("author"))
        .transform(Transform::flatten_id("resolved_by"))
        .transform(Transform::flatten_id("dismissed_by"))
        .transform(Transform::flatten_id("confirmed_by"))
}

fn project_variables() -> StreamDefinition {
    project_child("project_variables", "/variables")
        .schema(schemas::project_variables())
        .key_properties(&["project_id", "key"])
}

// ============================================================================
// Group children
// ============================================================================

fn group_child(name: &str, path: &str) -> StreamDefinition {
    StreamDefinition::new(name, format!("/groups/{{{{ partition.id }}}}{path}"))
        .parent("groups", "id")
        .key(&format!("group_{{{{ partition.id }}}}_{name}"))
        .transform(Transform::partition_field("id", "group_id"))
}

fn group_projects() -> StreamDefinition {
    group_child("group_projects", "/projects")
        .schema(schemas::group_projects())
        .key_properties(&["id"])
        .transform(Transform::flatten_id("owner"))
}

fn group_milestones() -> StreamDefinition {
    group_child("group_milestones", "/milestones")
        .schema(schemas::milestones())
        .key_properties(&["id"])
}

fn group_members() -> StreamDefinition {
    group_child("group_members", "/members")
        .schema(schemas::group_members())
        .key_properties(&["group_id", "id"])
        .transform(Transform::copy("id", "user_id"))
}

fn group_labels() -> StreamDefinition {
    group_child("group_labels", "/labels")
        .schema(schemas::group_labels())
        .key_properties(&["group_id", "id"])
        .pagination(PaginationConfig::fixed_page_size(LABELS_PAGE_SIZE))
}

fn epics() -> StreamDefinition {
    group_child("epics", "/epics")
        .query("order_by", "updated_at")
        .query("sort", "asc")
        .schema(schemas::epics())
        .key_properties(&["group_id", "id"])
        .server_side("updated_at", "updated_after")
        .sorted()
        .transform(Transform::flatten_id("author"))
}

fn epic_issues() -> StreamDefinition {
    StreamDefinition::new(
        "epic_issues",
        "/groups/{{ partition.group_id }}/epics/{{ partition.iid }}/issues",
    )
    .schema(schemas::epic_issues())
    .key_properties(&["group_id", "epic_iid", "epic_issue_id"])
    .parent("epics", "id")
    .key("group_{{ partition.group_id }}_epic_{{ partition.iid }}_issues")
    .transform(Transform::partition_field("group_id", "group_id"))
    .transform(Transform::partition_field("iid", "epic_iid"))
    .transform(Transform::copy("id", "issue_id"))
    .transform(Transform::copy("iid", "issue_iid"))
}

fn group_variables() -> StreamDefinition {
    group_child("group_variables", "/variables")
        .schema(schemas::group_variables())
        .key_properties(&["group_id", "key"])
}
