use thiserror::Error;

/// Errors raised while validating or decoding message payloads.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' expected a value of type {expected}")]
    FieldType { field: String, expected: &'static str },

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}
