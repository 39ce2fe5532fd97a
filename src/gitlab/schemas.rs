//! Record schemas for the GitLab streams
//!
//! Schemas describe records after stream transforms ran, so flattened
//! references appear as `*_id` fields and hoisted `time_stats` values sit at
//! the top level. Every field is nullable: GitLab omits or nulls fields
//! depending on edition, permissions and API version.

use crate::schema::{JsonType, RecordSchema, SchemaProperty};

/// Compact field kinds used to declare schemas
#[derive(Debug, Clone, Copy)]
enum Field {
    Int,
    Num,
    Str,
    Bool,
    Time,
    Date,
    /// Object kept as-is
    Obj,
    /// Array of integers
    Ints,
    /// Array of strings
    Strs,
    /// Array of arbitrary values
    List,
}

impl Field {
    fn property(self) -> SchemaProperty {
        match self {
            Self::Int => SchemaProperty::nullable(JsonType::Integer),
            Self::Num => SchemaProperty::nullable(JsonType::Number),
            Self::Str => SchemaProperty::nullable(JsonType::String),
            Self::Bool => SchemaProperty::nullable(JsonType::Boolean),
            Self::Time => SchemaProperty::nullable(JsonType::String).with_format("date-time"),
            Self::Date => SchemaProperty::nullable(JsonType::String).with_format("date"),
            Self::Obj => SchemaProperty::nullable(JsonType::Object),
            Self::Ints => SchemaProperty::array(SchemaProperty::new(JsonType::Integer)),
            Self::Strs => SchemaProperty::array(SchemaProperty::new(JsonType::String)),
            Self::List => SchemaProperty::nullable(JsonType::Array),
        }
    }
}

use Field::{Bool, Date, Int, Ints, List, Num, Obj, Str, Strs, Time};

fn build(fields: &[(&str, Field)]) -> RecordSchema {
    fields
        .iter()
        .fold(RecordSchema::new(), |schema, (name, field)| {
            schema.property(name, field.property())
        })
}

fn with(base: RecordSchema, fields: &[(&str, Field)]) -> RecordSchema {
    fields.iter().fold(base, |schema, (name, field)| {
        schema.property(name, field.property())
    })
}

const TIME_STATS: [(&str, Field); 4] = [
    ("time_estimate", Int),
    ("total_time_spent", Int),
    ("human_time_estimate", Str),
    ("human_total_time_spent", Str),
];

pub fn groups() -> RecordSchema {
    build(&[
        ("id", Int),
        ("name", Str),
        ("path", Str),
        ("full_name", Str),
        ("full_path", Str),
        ("description", Str),
        ("visibility", Str),
        ("web_url", Str),
        ("avatar_url", Str),
        ("parent_id", Int),
        ("created_at", Time),
        ("lfs_enabled", Bool),
        ("request_access_enabled", Bool),
        ("projects", List),
    ])
}

pub fn projects() -> RecordSchema {
    build(&[
        ("id", Int),
        ("name", Str),
        ("name_with_namespace", Str),
        ("path", Str),
        ("path_with_namespace", Str),
        ("description", Str),
        ("default_branch", Str),
        ("visibility", Str),
        ("archived", Bool),
        ("web_url", Str),
        ("http_url_to_repo", Str),
        ("ssh_url_to_repo", Str),
        ("owner_id", Int),
        ("creator_id", Int),
        ("namespace", Obj),
        ("created_at", Time),
        ("last_activity_at", Time),
        ("star_count", Int),
        ("forks_count", Int),
        ("open_issues_count", Int),
        ("issues_enabled", Bool),
        ("merge_requests_enabled", Bool),
        ("wiki_enabled", Bool),
        ("jobs_enabled", Bool),
        ("snippets_enabled", Bool),
        ("container_registry_enabled", Bool),
        ("shared_runners_enabled", Bool),
        ("lfs_enabled", Bool),
        ("public_jobs", Bool),
        ("only_allow_merge_if_pipeline_succeeds", Bool),
        ("only_allow_merge_if_all_discussions_are_resolved", Bool),
        ("request_access_enabled", Bool),
        ("merge_method", Str),
        ("tag_list", Strs),
        ("topics", Strs),
        ("statistics", Obj),
    ])
}

pub fn users() -> RecordSchema {
    build(&[
        ("id", Int),
        ("name", Str),
        ("username", Str),
        ("state", Str),
        ("avatar_url", Str),
        ("web_url", Str),
        ("created_at", Time),
        ("bot", Bool),
    ])
}

pub fn branches() -> RecordSchema {
    build(&[
        ("project_id", Int),
        ("name", Str),
        ("commit_id", Str),
        ("merged", Bool),
        ("protected", Bool),
        ("default", Bool),
        ("developers_can_push", Bool),
        ("developers_can_merge", Bool),
        ("can_push", Bool),
        ("web_url", Str),
    ])
}

pub fn commits() -> RecordSchema {
    build(&[
        ("id", Str),
        ("project_id", Int),
        ("short_id", Str),
        ("title", Str),
        ("message", Str),
        ("author_name", Str),
        ("author_email", Str),
        ("authored_date", Time),
        ("committer_name", Str),
        ("committer_email", Str),
        ("committed_date", Time),
        ("created_at", Time),
        ("parent_ids", Strs),
        ("stats", Obj),
        ("web_url", Str),
    ])
}

pub fn issues() -> RecordSchema {
    with(
        build(&[
            ("id", Int),
            ("iid", Int),
            ("project_id", Int),
            ("title", Str),
            ("description", Str),
            ("state", Str),
            ("type", Str),
            ("issue_type", Str),
            ("author_id", Int),
            ("assignee_id", Int),
            ("assignees", Ints),
            ("closed_by_id", Int),
            ("milestone_id", Int),
            ("epic_id", Int),
            ("labels", Strs),
            ("upvotes", Int),
            ("downvotes", Int),
            ("user_notes_count", Int),
            ("merge_requests_count", Int),
            ("confidential", Bool),
            ("discussion_locked", Bool),
            ("weight", Int),
            ("due_date", Date),
            ("web_url", Str),
            ("created_at", Time),
            ("updated_at", Time),
            ("closed_at", Time),
        ]),
        &TIME_STATS,
    )
}

pub fn merge_requests() -> RecordSchema {
    with(
        build(&[
            ("id", Int),
            ("iid", Int),
            ("project_id", Int),
            ("title", Str),
            ("description", Str),
            ("state", Str),
            ("author_id", Int),
            ("assignee_id", Int),
            ("assignees", Ints),
            ("reviewers", Ints),
            ("merged_by_id", Int),
            ("closed_by_id", Int),
            ("milestone_id", Int),
            ("source_branch", Str),
            ("target_branch", Str),
            ("source_project_id", Int),
            ("target_project_id", Int),
            ("labels", Strs),
            ("draft", Bool),
            ("work_in_progress", Bool),
            ("merge_when_pipeline_succeeds", Bool),
            ("merge_status", Str),
            ("detailed_merge_status", Str),
            ("sha", Str),
            ("merge_commit_sha", Str),
            ("squash_commit_sha", Str),
            ("squash", Bool),
            ("upvotes", Int),
            ("downvotes", Int),
            ("user_notes_count", Int),
            ("should_remove_source_branch", Bool),
            ("force_remove_source_branch", Bool),
            ("web_url", Str),
            ("created_at", Time),
            ("updated_at", Time),
            ("merged_at", Time),
            ("closed_at", Time),
        ]),
        &TIME_STATS,
    )
}

pub fn notes() -> RecordSchema {
    build(&[
        ("id", Int),
        ("project_id", Int),
        ("noteable_id", Int),
        ("noteable_iid", Int),
        ("noteable_type", Str),
        ("type", Str),
        ("body", Str),
        ("author_id", Int),
        ("system", Bool),
        ("internal", Bool),
        ("confidential", Bool),
        ("resolvable", Bool),
        ("created_at", Time),
        ("updated_at", Time),
    ])
}

pub fn merge_request_commits() -> RecordSchema {
    build(&[
        ("project_id", Int),
        ("merge_request_iid", Int),
        ("commit_id", Str),
        ("commit_short_id", Str),
    ])
}

pub fn milestones() -> RecordSchema {
    build(&[
        ("id", Int),
        ("iid", Int),
        ("project_id", Int),
        ("group_id", Int),
        ("title", Str),
        ("description", Str),
        ("state", Str),
        ("expired", Bool),
        ("due_date", Date),
        ("start_date", Date),
        ("web_url", Str),
        ("created_at", Time),
        ("updated_at", Time),
    ])
}

fn members(owner_field: &'static str) -> RecordSchema {
    with(
        build(&[
            ("id", Int),
            ("user_id", Int),
            ("username", Str),
            ("name", Str),
            ("state", Str),
            ("access_level", Int),
            ("expires_at", Date),
            ("created_at", Time),
            ("web_url", Str),
        ]),
        &[(owner_field, Int)],
    )
}

pub fn project_members() -> RecordSchema {
    members("project_id")
}

pub fn group_members() -> RecordSchema {
    members("group_id")
}

fn labels(owner_field: &'static str) -> RecordSchema {
    with(
        build(&[
            ("id", Int),
            ("name", Str),
            ("color", Str),
            ("text_color", Str),
            ("description", Str),
            ("open_issues_count", Int),
            ("closed_issues_count", Int),
            ("open_merge_requests_count", Int),
            ("subscribed", Bool),
            ("priority", Int),
            ("is_project_label", Bool),
        ]),
        &[(owner_field, Int)],
    )
}

pub fn project_labels() -> RecordSchema {
    labels("project_id")
}

pub fn group_labels() -> RecordSchema {
    labels("group_id")
}

pub fn languages() -> RecordSchema {
    build(&[("project_id", Int), ("language_name", Str), ("percent", Num)])
}

pub fn readme() -> RecordSchema {
    build(&[("project_id", Int), ("content", Str)])
}

pub fn releases() -> RecordSchema {
    build(&[
        ("project_id", Int),
        ("tag_name", Str),
        ("name", Str),
        ("description", Str),
        ("author_id", Int),
        ("commit_id", Str),
        ("upcoming_release", Bool),
        ("created_at", Time),
        ("released_at", Time),
    ])
}

pub fn tags() -> RecordSchema {
    build(&[
        ("project_id", Int),
        ("name", Str),
        ("message", Str),
        ("target", Str),
        ("commit_id", Str),
        ("protected", Bool),
        ("release", Obj),
    ])
}

pub fn pipelines() -> RecordSchema {
    build(&[
        ("id", Int),
        ("iid", Int),
        ("project_id", Int),
        ("sha", Str),
        ("ref", Str),
        ("status", Str),
        ("source", Str),
        ("web_url", Str),
        ("created_at", Time),
        ("updated_at", Time),
    ])
}

pub fn pipelines_extended() -> RecordSchema {
    with(
        pipelines(),
        &[
            ("before_sha", Str),
            ("tag", Bool),
            ("yaml_errors", Str),
            ("user", Obj),
            ("started_at", Time),
            ("finished_at", Time),
            ("committed_at", Time),
            ("duration", Num),
            ("queued_duration", Num),
            ("coverage", Str),
            ("detailed_status", Obj),
        ],
    )
}

pub fn jobs() -> RecordSchema {
    build(&[
        ("id", Int),
        ("project_id", Int),
        ("name", Str),
        ("stage", Str),
        ("status", Str),
        ("ref", Str),
        ("tag", Bool),
        ("coverage", Num),
        ("allow_failure", Bool),
        ("failure_reason", Str),
        ("user_id", Int),
        ("commit_id", Str),
        ("pipeline_id", Int),
        ("runner_id", Int),
        ("duration", Num),
        ("queued_duration", Num),
        ("artifacts", List),
        ("tag_list", Strs),
        ("web_url", Str),
        ("created_at", Time),
        ("started_at", Time),
        ("finished_at", Time),
    ])
}

pub fn bridges() -> RecordSchema {
    build(&[
        ("id", Int),
        ("project_id", Int),
        ("name", Str),
        ("stage", Str),
        ("status", Str),
        ("ref", Str),
        ("tag", Bool),
        ("coverage", Num),
        ("allow_failure", Bool),
        ("user_id", Int),
        ("commit_id", Str),
        ("pipeline_id", Int),
        ("downstream_pipeline", Obj),
        ("duration", Num),
        ("queued_duration", Num),
        ("web_url", Str),
        ("created_at", Time),
        ("started_at", Time),
        ("finished_at", Time),
    ])
}

pub fn vulnerabilities() -> RecordSchema {
    build(&[
        ("id", Int),
        ("project_id", Int),
        ("title", Str),
        ("description", Str),
        ("state", Str),
        ("severity", Str),
        ("confidence", Str),
        ("report_type", Str),
        ("author_id", Int),
        ("resolved_by_id", Int),
        ("dismissed_by_id", Int),
        ("confirmed_by_id", Int),
        ("resolved_on_default_branch", Bool),
        ("finding", Obj),
        ("created_at", Time),
        ("updated_at", Time),
        ("resolved_at", Time),
        ("dismissed_at", Time),
        ("confirmed_at", Time),
    ])
}

pub fn epics() -> RecordSchema {
    build(&[
        ("id", Int),
        ("iid", Int),
        ("group_id", Int),
        ("parent_id", Int),
        ("title", Str),
        ("description", Str),
        ("state", Str),
        ("author_id", Int),
        ("labels", Strs),
        ("confidential", Bool),
        ("upvotes", Int),
        ("downvotes", Int),
        ("web_url", Str),
        ("start_date", Date),
        ("end_date", Date),
        ("due_date", Date),
        ("created_at", Time),
        ("updated_at", Time),
        ("closed_at", Time),
    ])
}

pub fn epic_issues() -> RecordSchema {
    build(&[
        ("group_id", Int),
        ("epic_iid", Int),
        ("epic_issue_id", Int),
        ("issue_id", Int),
        ("issue_iid", Int),
        ("project_id", Int),
        ("title", Str),
        ("state", Str),
        ("relative_position", Int),
        ("web_url", Str),
        ("created_at", Time),
        ("updated_at", Time),
    ])
}

fn variables(owner_field: &'static str) -> RecordSchema {
    with(
        build(&[
            ("key", Str),
            ("value", Str),
            ("variable_type", Str),
            ("protected", Bool),
            ("masked", Bool),
            ("raw", Bool),
            ("environment_scope", Str),
        ]),
        &[(owner_field, Int)],
    )
}

pub fn group_projects() -> RecordSchema {
    with(projects(), &[("group_id", Int)])
}

pub fn project_variables() -> RecordSchema {
    variables("project_id")
}

pub fn group_variables() -> RecordSchema {
    variables("group_id")
}
