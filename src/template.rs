//! Template interpolation for stream paths and stream keys
//!
//! Handles `{{ variable }}` interpolation in stream definitions.
//! Supports nested access like `{{ config.api_url }}` and `{{ partition.project_id }}`.
//!
//! Paths are rendered with [`render_path`], which escapes each substituted
//! value as a single URL path segment (`group/project` becomes `group%2Fproject`).

use crate::error::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}")
        .expect("template regex is valid")
});

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Tap configuration values
    pub config: Value,
    /// Values of the partition (configured id or parent record) this instance runs for
    pub partition: Value,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with config values
    pub fn with_config(config: Value) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Set partition values
    pub fn set_partition(&mut self, partition: Value) -> &mut Self {
        self.partition = partition;
        self
    }

    /// Get a value by path (e.g., "partition.id")
    pub fn get(&self, path: &str) -> Option<&Value> {
        let parts: Vec<&str> = path.split('.').collect();

        let root = match parts[0] {
            "config" => &self.config,
            "partition" => &self.partition,
            _ => return None,
        };

        if parts.len() == 1 {
            Some(root)
        } else {
            get_nested_value(root, &parts[1..])
        }
    }
}

/// Get a nested value from a JSON value by path
fn get_nested_value<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for part in path {
        match current {
            Value::Object(map) => {
                current = map.get(*part)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Render a template string with the given context
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    render_with(template, ctx, value_to_string)
}

/// Render a URL path template, escaping each substituted value as a path segment
pub fn render_path(template: &str, ctx: &TemplateContext) -> Result<String> {
    render_with(template, ctx, |value| {
        urlencoding::encode(&value_to_string(value)).into_owned()
    })
}

fn render_with(
    template: &str,
    ctx: &TemplateContext,
    format_value: impl Fn(&Value) -> String,
) -> Result<String> {
    let mut errors = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |cap: &regex::Captures<'_>| {
        let var_path = &cap[1];
        match ctx.get(var_path) {
            Some(Value::Null) | None => {
                errors.push(var_path.to_string());
                String::new()
            }
            Some(value) => format_value(value),
        }
    });

    if errors.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(errors.join(", ")))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
