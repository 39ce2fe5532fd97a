//! Schema types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// JSON Schema type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl JsonType {
    /// Check whether a JSON value is an instance of this type
    pub fn matches(self, value: &Value) -> bool {
        match self {
            JsonType::String => value.is_string(),
            JsonType::Number => value.is_number(),
            JsonType::Integer => value.is_i64() || value.is_u64(),
            JsonType::Boolean => value.is_boolean(),
            JsonType::Object => value.is_object(),
            JsonType::Array => value.is_array(),
            JsonType::Null => value.is_null(),
        }
    }
}

impl std::fmt::Display for JsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonType::String => write!(f, "string"),
            JsonType::Number => write!(f, "number"),
            JsonType::Integer => write!(f, "integer"),
            JsonType::Boolean => write!(f, "boolean"),
            JsonType::Object => write!(f, "object"),
            JsonType::Array => write!(f, "array"),
            JsonType::Null => write!(f, "null"),
        }
    }
}

/// JSON type can be a single type or array of types (for nullable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonTypeOrArray {
    Single(JsonType),
    Multiple(Vec<JsonType>),
}

impl JsonTypeOrArray {
    /// Create a single type
    pub fn single(t: JsonType) -> Self {
        JsonTypeOrArray::Single(t)
    }

    /// Create a nullable type
    pub fn nullable(t: JsonType) -> Self {
        if t == JsonType::Null {
            JsonTypeOrArray::Single(JsonType::Null)
        } else {
            JsonTypeOrArray::Multiple(vec![JsonType::Null, t])
        }
    }

    /// Check if this type is nullable
    pub fn is_nullable(&self) -> bool {
        self.contains(JsonType::Null)
    }

    /// Check whether a type is listed
    pub fn contains(&self, t: JsonType) -> bool {
        match self {
            JsonTypeOrArray::Single(single) => *single == t,
            JsonTypeOrArray::Multiple(types) => types.contains(&t),
        }
    }

    /// Get the primary (non-null) type
    pub fn primary_type(&self) -> Option<JsonType> {
        match self {
            JsonTypeOrArray::Single(t) => Some(*t),
            JsonTypeOrArray::Multiple(types) => types.iter().copied().find(|t| *t != JsonType::Null),
        }
    }
}

/// JSON Schema property definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaProperty {
    /// Property type(s); absent means any value is accepted
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub json_type: Option<JsonTypeOrArray>,

    /// Description (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Format hint (e.g., "date-time")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Nested properties (for objects)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, SchemaProperty>>,

    /// Array items schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaProperty>>,
}

impl SchemaProperty {
    /// Create a new property with the given type
    pub fn new(json_type: JsonType) -> Self {
        Self {
            json_type: Some(JsonTypeOrArray::single(json_type)),
            ..Default::default()
        }
    }

    /// Create a nullable property
    pub fn nullable(json_type: JsonType) -> Self {
        Self {
            json_type: Some(JsonTypeOrArray::nullable(json_type)),
            ..Default::default()
        }
    }

    /// Create a nullable object property with nested properties
    pub fn object(properties: BTreeMap<String, SchemaProperty>) -> Self {
        Self {
            json_type: Some(JsonTypeOrArray::nullable(JsonType::Object)),
            properties: Some(properties),
            ..Default::default()
        }
    }

    /// Create a nullable array property with item schema
    pub fn array(items: SchemaProperty) -> Self {
        Self {
            json_type: Some(JsonTypeOrArray::nullable(JsonType::Array)),
            items: Some(Box::new(items)),
            ..Default::default()
        }
    }

    /// Set format hint
    #[must_use]
    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    /// Check if nullable (untyped properties accept null)
    pub fn is_nullable(&self) -> bool {
        self.json_type
            .as_ref()
            .map_or(true, JsonTypeOrArray::is_nullable)
    }

    /// Whether this property is a `date-time` string
    pub fn is_date_time(&self) -> bool {
        self.format.as_deref() == Some("date-time")
    }
}

/// Record schema for one stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Schema type (always "object" for top-level)
    #[serde(rename = "type", default = "default_object_type")]
    pub json_type: JsonTypeOrArray,

    /// Object properties
    #[serde(default)]
    pub properties: BTreeMap<String, SchemaProperty>,
}

fn default_object_type() -> JsonTypeOrArray {
    JsonTypeOrArray::nullable(JsonType::Object)
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSchema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self {
            json_type: default_object_type(),
            properties: BTreeMap::new(),
        }
    }

    /// Add a property (builder style)
    #[must_use]
    pub fn property(mut self, name: &str, property: SchemaProperty) -> Self {
        self.properties.insert(name.to_string(), property);
        self
    }

    /// Get a property
    pub fn get_property(&self, name: &str) -> Option<&SchemaProperty> {
        self.properties.get(name)
    }

    /// Property names in order
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Parse a JSON Schema document
    pub fn from_value(value: Value) -> crate::error::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
