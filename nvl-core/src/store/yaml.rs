//! YAML format, used for issuer configuration and global settings.

use serde_json::{Map, Value};

use super::{FileStore, Format};

/// Serialize a record as a YAML document.
pub fn serialize(value: &Value) -> Result<String, String> {
    serde_yaml::to_string(value).map_err(|e| e.to_string())
}

/// Parse a YAML document.
///
/// An empty document is read as an empty mapping so that a blank file
/// behaves like a file with no keys set.
pub fn deserialize(contents: &str) -> Result<Value, String> {
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_yaml::from_str(contents).map_err(|e| e.to_string())
}

pub(super) fn register(store: &mut FileStore) {
    store.register_serializer(Format::yaml(), serialize);
    store.register_deserializer(Format::yaml(), deserialize);
}
