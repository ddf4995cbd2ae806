//! JSON format, used for session files.

use serde_json::Value;

use super::{FileStore, Format};

/// Serialize a record as pretty-printed JSON.
pub fn serialize(value: &Value) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}

/// Parse a JSON document.
pub fn deserialize(contents: &str) -> Result<Value, String> {
    serde_json::from_str(contents).map_err(|e| e.to_string())
}

pub(super) fn register(store: &mut FileStore) {
    store.register_serializer(Format::json(), serialize);
    store.register_deserializer(Format::json(), deserialize);
}
