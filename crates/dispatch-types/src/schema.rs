//! Message schema definitions.
//!
//! A [`MessageSchema`] is a structured, data-only description of a message:
//! its name and an ordered list of fields, each with a semantic type, an
//! optional example value and an optional description. Schemas drive both
//! payload validation at runtime and the message definitions emitted into
//! the generated contract.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SchemaError;

/// Semantic type of a message field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    /// RFC 3339 timestamp carried as a string.
    Timestamp,
}

impl FieldType {
    /// JSON schema type name for this field type.
    pub fn json_type(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::Timestamp => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String | FieldType::Timestamp => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.json_type())
    }
}

/// A single field in a message schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSchema {
    /// A field that must be present in every payload.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            example: None,
            description: None,
        }
    }

    /// A field that may be omitted (or null) in payloads.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    /// Attach an example value, rendered into the generated contract.
    pub fn with_example(mut self, example: impl Into<Value>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Structured description of one message type.
///
/// The schema name must be unique among all messages registered with an
/// application; the registry enforces this at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSchema {
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldSchema>,
}

impl MessageSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field, preserving declaration order.
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Validate a decoded JSON payload against this schema.
    ///
    /// The payload must be a JSON object; unknown fields, missing required
    /// fields and type mismatches are all decode errors. Optional fields
    /// accept explicit nulls.
    pub fn validate(&self, payload: &Value) -> Result<(), SchemaError> {
        let object = payload.as_object().ok_or(SchemaError::NotAnObject)?;

        for key in object.keys() {
            if !self.fields.iter().any(|f| f.name == *key) {
                return Err(SchemaError::UnknownField(key.clone()));
            }
        }

        for field in &self.fields {
            match object.get(&field.name) {
                Some(Value::Null) if !field.required => {}
                Some(value) => {
                    if !field.field_type.matches(value) {
                        return Err(SchemaError::FieldType {
                            field: field.name.clone(),
                            expected: field.field_type.json_type(),
                        });
                    }
                }
                None if field.required => {
                    return Err(SchemaError::MissingField(field.name.clone()));
                }
                None => {}
            }
        }

        Ok(())
    }

    /// Render an example payload for documentation.
    ///
    /// Returns `Some` only when every required field declares an example
    /// value; optional fields with examples are included. Examples are never
    /// fabricated for fields that do not declare one.
    pub fn example(&self) -> Option<Value> {
        if self
            .fields
            .iter()
            .any(|f| f.required && f.example.is_none())
        {
            return None;
        }

        let mut map = Map::new();
        for field in &self.fields {
            if let Some(example) = &field.example {
                map.insert(field.name.clone(), example.clone());
            }
        }
        Some(Value::Object(map))
    }

    /// JSON schema rendering of the payload, used for the generated contract.
    pub fn payload_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut property = Map::new();
            property.insert("type".to_string(), Value::String(field.field_type.json_type().to_string()));
            if field.field_type == FieldType::Timestamp {
                property.insert("format".to_string(), Value::String("date-time".to_string()));
            }
            if let Some(description) = &field.description {
                property.insert("description".to_string(), Value::String(description.clone()));
            }
            if let Some(example) = &field.example {
                property.insert("example".to_string(), example.clone());
            }
            properties.insert(field.name.clone(), Value::Object(property));
        }

        let required: Vec<Value> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| Value::String(f.name.clone()))
            .collect();

        let mut schema = Map::new();
        schema.insert("title".to_string(), Value::String(self.name.clone()));
        schema.insert("type".to_string(), Value::String("object".to_string()));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }
}
