//! Component C2 (spec §4.2): one validator per interface/method
//! descriptor shape, compiled once at first use. This set is fixed by
//! the crate itself, the same way the teacher's message types are fixed
//! by its own `dwn/*-types.rs` drafts rather than loaded from config.
//!
//! Protocol-declared record `schema`/`dataFormat` are a different,
//! shallower concern: a plain tag a `ProtocolDefinition` pins per record
//! type, checked by string equality in [`crate::protocol::RuleSet`]
//! rather than compiled as a JSON Schema — nothing in this crate's
//! wire format carries an inline schema body for types to compile.
use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;
use serde_json::{json, Value};

use super::{Error, SchemaValidator};

fn schemas() -> &'static HashMap<&'static str, SchemaValidator> {
    static REGISTRY: OnceLock<HashMap<&'static str, SchemaValidator>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        for (name, required) in DESCRIPTOR_SCHEMAS {
            let schema = json!({"type": "object", "required": required});
            let validator = SchemaValidator::compile(*name, &schema)
                .expect("crate-authored descriptor schemas are always valid JSON Schema");
            map.insert(*name, validator);
        }
        map
    })
}

/// `(schema name, required top-level descriptor fields)` for every
/// interface/method pair spec §6 lists. Deliberately shallow: it checks
/// that a descriptor carries the fields its method cannot do without,
/// not the full shape of nested objects like `filter`/`definition`/
/// `scope` — Rust's own descriptor structs already enforce those at the
/// deserialization boundary this validator sits behind.
const DESCRIPTOR_SCHEMAS: &[(&str, &[&str])] = &[
    ("RecordsWrite", &["interface", "method", "dataFormat", "dataCid", "dataSize", "dateCreated", "messageTimestamp"]),
    ("RecordsRead", &["interface", "method", "messageTimestamp", "recordId"]),
    ("RecordsDelete", &["interface", "method", "messageTimestamp"]),
    ("RecordsQuery", &["interface", "method", "messageTimestamp"]),
    ("RecordsSubscribe", &["interface", "method", "messageTimestamp"]),
    ("ProtocolsConfigure", &["interface", "method", "messageTimestamp", "definition"]),
    ("ProtocolsQuery", &["interface", "method", "messageTimestamp"]),
    ("PermissionsGrant", &["interface", "method", "messageTimestamp", "grantee", "dateGranted", "dateExpires", "scope"]),
    ("PermissionsRevoke", &["interface", "method", "messageTimestamp", "permissionGrantId"]),
    ("PermissionsRequest", &["interface", "method", "messageTimestamp", "scope"]),
    ("EventsGet", &["interface", "method", "messageTimestamp", "messageCid"]),
    ("EventsQuery", &["interface", "method", "messageTimestamp"]),
    ("EventsSubscribe", &["interface", "method", "messageTimestamp"]),
    ("MessagesGet", &["interface", "method", "messageTimestamp", "messageCid"]),
    ("MessagesQuery", &["interface", "method", "messageTimestamp"]),
    ("MessagesSubscribe", &["interface", "method", "messageTimestamp"]),
];

/// Validates `descriptor` against the compiled schema registered under
/// `name`. Every handler's PARSE step calls this before doing anything
/// else with the message (spec §4.2: "every persisted message must pass
/// validation before any other processing").
pub fn validate(name: &str, descriptor: &impl Serialize) -> Result<(), Error> {
    let value: Value = serde_json::to_value(descriptor)?;
    let validator = schemas().get(name).ok_or_else(|| Error::SchemaNotFound(name.to_string()))?;
    validator.validate(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_write_descriptor_passes() {
        let descriptor = json!({
            "interface": "Records",
            "method": "Write",
            "dataFormat": "application/json",
            "dataCid": "bafkdata",
            "dataSize": 5,
            "dateCreated": "2024-01-01T00:00:00.000001Z",
            "messageTimestamp": "2024-01-01T00:00:00.000001Z",
        });
        assert!(validate("RecordsWrite", &descriptor).is_ok());
    }

    #[test]
    fn records_write_descriptor_missing_data_cid_fails() {
        let descriptor = json!({
            "interface": "Records",
            "method": "Write",
            "dataFormat": "application/json",
            "dataSize": 5,
            "dateCreated": "2024-01-01T00:00:00.000001Z",
            "messageTimestamp": "2024-01-01T00:00:00.000001Z",
        });
        assert!(validate("RecordsWrite", &descriptor).is_err());
    }

    #[test]
    fn unknown_schema_name_errors() {
        let descriptor = json!({});
        assert!(matches!(validate("NoSuchSchema", &descriptor), Err(Error::SchemaNotFound(_))));
    }

    #[test]
    fn records_read_descriptor_requires_record_id() {
        let descriptor = json!({
            "interface": "Records",
            "method": "Read",
            "messageTimestamp": "2024-01-01T00:00:00.000001Z",
        });
        assert!(validate("RecordsRead", &descriptor).is_err());
    }
}
