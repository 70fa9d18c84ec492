//! Core tool abstraction shared by every agent-callable capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field type accepted in a tool input schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
}

impl FieldType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            // Integers also satisfy `number`; the reverse is not true.
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named field of a tool input schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
    /// Applied when an optional field is absent from the model's input.
    pub default: Option<Value>,
    pub description: String,
}

impl FieldSpec {
    pub fn required(name: &str, ty: FieldType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            ty,
            required: true,
            default: None,
            description: description.to_string(),
        }
    }

    pub fn optional(name: &str, ty: FieldType, default: Option<Value>, description: &str) -> Self {
        Self {
            name: name.to_string(),
            ty,
            required: false,
            default,
            description: description.to_string(),
        }
    }
}

/// Validation failure for one tool invocation input.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(String),
    #[error("field '{field}' expected {expected}, got {got}")]
    WrongType {
        field: String,
        expected: FieldType,
        got: String,
    },
}

/// Ordered input schema for one tool. Field order is the order the prompt
/// renderer presents fields in, so it is part of the registered contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validate a parsed JSON object against this schema.
    ///
    /// Required fields must be present with the declared type. Optional fields
    /// are type-checked when present and filled from their default when absent.
    /// Keys the schema does not know are passed through untouched; models
    /// routinely add stray keys and dropping the call over them helps nobody.
    pub fn validate(&self, input: &Map<String, Value>) -> Result<Map<String, Value>, ValidationError> {
        let mut validated = input.clone();

        for field in &self.fields {
            match input.get(&field.name) {
                Some(Value::Null) | None => {
                    if field.required {
                        return Err(ValidationError::MissingField(field.name.clone()));
                    }
                    if let Some(default) = &field.default {
                        validated.insert(field.name.clone(), default.clone());
                    }
                }
                Some(value) => {
                    if !field.ty.matches(value) {
                        return Err(ValidationError::WrongType {
                            field: field.name.clone(),
                            expected: field.ty,
                            got: json_type_name(value).to_string(),
                        });
                    }
                }
            }
        }

        Ok(validated)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Registered contract for one tool: unique name, human description, and the
/// input schema the model must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input: InputSchema,
}

/// A capability the dispatch loop can invoke on behalf of the model.
///
/// `invoke` receives input that has already been parsed and validated against
/// [`Tool::input_schema`]; implementations never re-parse raw JSON strings.
/// The returned string is the observation fed back to the model and should be
/// a JSON object with at least a `status` field by convention.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> InputSchema;

    /// Full registered contract, assembled from the other accessors.
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input: self.input_schema(),
        }
    }

    async fn invoke(&self, input: Map<String, Value>) -> anyhow::Result<String>;
}

impl fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool").field("name", &self.name()).finish()
    }
}
