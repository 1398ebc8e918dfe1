//! Typed message payload contract.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::SchemaError;
use crate::schema::MessageSchema;

/// A typed message payload bound to a [`MessageSchema`].
///
/// Implementors pair a serde-serializable type with the schema describing
/// its fields. Payloads are canonically JSON, encoded as UTF-8 bytes.
///
/// # Example
///
/// ```rust
/// use dispatch_types::{FieldSchema, FieldType, KafkaMessage, MessageSchema};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct HelloMessage {
///     msg: String,
/// }
///
/// impl KafkaMessage for HelloMessage {
///     fn schema() -> MessageSchema {
///         MessageSchema::new("HelloMessage")
///             .field(FieldSchema::required("msg", FieldType::String).with_example("Hello"))
///     }
/// }
///
/// let payload = HelloMessage { msg: "Hello".into() }.to_payload().unwrap();
/// let decoded = HelloMessage::from_payload(&payload).unwrap();
/// assert_eq!(decoded.msg, "Hello");
/// ```
pub trait KafkaMessage: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Schema describing this message's fields.
    fn schema() -> MessageSchema;

    /// Encode the message into its JSON payload form.
    fn to_payload(&self) -> Result<Vec<u8>, SchemaError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a payload, validating it against the schema first.
    ///
    /// Unknown fields and missing required fields fail with a decode error
    /// before deserialization is attempted.
    fn from_payload(payload: &[u8]) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_slice(payload)?;
        Self::schema().validate(&value)?;
        Ok(serde_json::from_value(value)?)
    }
}
