//! Protocol definitions: the nested rule tree a `ProtocolsConfigure`
//! message installs, walked by `auth::rules` to decide whether a
//! `RecordsWrite`/`RecordsRead`/... is permitted at a given
//! `protocolPath`.
//!
//! Grounded in the teacher's `dwn/protocol.rs` (`Protocol::new`/
//! `is_valid_child`/`validate`, `SystemProtocols`) for the
//! builder-with-validation idiom; the rule shape itself (`structure`,
//! `who`/`of`/`can`) is this crate's own, the flat channel/permission
//! capability model the teacher actually implements does not carry over.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("protocol URI is not normalized: {0}")]
    UriNotNormalized(String),
    #[error("protocol not found: {0}")]
    NotFound(String),
    #[error("protocol path not found in structure: {0}")]
    PathNotFound(String),
    #[error("record does not carry the schema {0:?} this protocol type declares")]
    SchemaMismatch(String),
    #[error("record does not carry the dataFormat {0:?} this protocol type declares")]
    DataFormatMismatch(String),
    #[error(transparent)]
    Store(#[from] crate::store::Error),
    #[error(transparent)]
    Message(#[from] crate::message::Error),
}

/// Who a rule's `who` clause grants access to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Actor {
    Anyone,
    Author,
    Recipient,
}

/// `of` names the ancestor record (by protocol path) an `author`/
/// `recipient` actor clause is evaluated against; absent for `anyone`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRule {
    pub who: Actor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub of: Option<String>,
    pub can: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default, rename = "$actions", skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_format: Option<String>,
    #[serde(default, flatten)]
    pub children: BTreeMap<String, RuleSet>,
}

impl RuleSet {
    /// A rule set that pins a `schema`/`dataFormat` for its type rejects
    /// any record whose descriptor doesn't carry that exact value; a rule
    /// set that leaves either unset imposes no constraint on it.
    pub fn check_conformance(&self, schema: Option<&str>, data_format: &str) -> Result<(), Error> {
        if let Some(expected) = &self.schema {
            if schema != Some(expected.as_str()) {
                return Err(Error::SchemaMismatch(expected.clone()));
            }
        }
        if let Some(expected) = &self.data_format {
            if data_format != expected {
                return Err(Error::DataFormatMismatch(expected.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolDefinition {
    pub protocol: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub types: BTreeMap<String, TypeDefinition>,
    #[serde(default)]
    pub structure: BTreeMap<String, RuleSet>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, rename = "dataFormats", skip_serializing_if = "Vec::is_empty")]
    pub data_formats: Vec<String>,
}

impl ProtocolDefinition {
    /// A protocol URI is normalized when it already equals its own
    /// [`normalize_uri`] output; this mirrors the teacher's own
    /// `Protocol::new` validation step, generalized from its fixed
    /// `SystemProtocols` set to an arbitrary declared URI. A
    /// `ProtocolsConfigure` carrying a non-normalized form (scheme-less,
    /// trailing slash, query, or fragment) is rejected rather than
    /// silently rewritten, so two tenants can't configure what looks
    /// like the same protocol under different URI spellings.
    pub fn validate(&self) -> Result<(), Error> {
        if normalize_uri(&self.protocol)? != self.protocol {
            return Err(Error::UriNotNormalized(self.protocol.clone()));
        }
        Ok(())
    }

    /// Walks `protocol_path` (slash-separated type names) into
    /// `structure`, returning the rule set that governs records at that
    /// path.
    pub fn rule_set_at(&self, protocol_path: &str) -> Result<&RuleSet, Error> {
        let mut segments = protocol_path.split('/');
        let first = segments.next().ok_or_else(|| Error::PathNotFound(protocol_path.to_string()))?;
        let mut current = self
            .structure
            .get(first)
            .ok_or_else(|| Error::PathNotFound(protocol_path.to_string()))?;
        for segment in segments {
            current = current
                .children
                .get(segment)
                .ok_or_else(|| Error::PathNotFound(protocol_path.to_string()))?;
        }
        Ok(current)
    }
}

/// Normalizes a protocol URI: a scheme-less value is given an implicit
/// `http://`, then any query string and fragment are dropped and a
/// trailing slash is stripped. Anything that still doesn't parse as a
/// URL is rejected outright.
pub fn normalize_uri(uri: &str) -> Result<String, Error> {
    let with_scheme = if uri.contains("://") { uri.to_string() } else { format!("http://{uri}") };
    let mut parsed = url::Url::parse(&with_scheme).map_err(|_| Error::UriNotNormalized(uri.to_string()))?;
    parsed.set_query(None);
    parsed.set_fragment(None);
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// The slice of a `ProtocolsConfigure` message this module needs to recover
/// its `ProtocolDefinition` from stored bytes, without depending on
/// `handlers::protocols_configure`'s full descriptor type (that would put
/// `auth`/`protocol` downstream of `handlers`, which authorizes through
/// them).
#[derive(Deserialize)]
struct ConfigureEnvelope {
    descriptor: ConfigureDescriptorOnly,
}

#[derive(Deserialize)]
struct ConfigureDescriptorOnly {
    definition: ProtocolDefinition,
}

/// Loads the currently active `ProtocolsConfigure` definition for
/// `protocol`, used by `auth::rules` to resolve the rule set a
/// `RecordsWrite`/`RecordsRead`/... must satisfy. "Currently active" means
/// the single record `ProtocolsConfigure`'s own conflict-resolution step
/// (spec §4.5) has already reduced the store to, so any match is the
/// newest by construction.
pub async fn load_definition(
    message_store: &dyn crate::store::MessageStore,
    tenant: &str,
    protocol: &str,
) -> Result<ProtocolDefinition, Error> {
    use crate::store::{Filter, FilterValue, IndexValue, QueryOptions};

    let mut filter = Filter::new();
    filter.insert("interface".to_string(), FilterValue::Equal(IndexValue::Text("Protocols".to_string())));
    filter.insert("method".to_string(), FilterValue::Equal(IndexValue::Text("Configure".to_string())));
    filter.insert("protocol".to_string(), FilterValue::Equal(IndexValue::Text(protocol.to_string())));

    let (results, _) = message_store.query(tenant, &vec![filter], &QueryOptions::default()).await?;
    let record = results.into_iter().next().ok_or_else(|| Error::NotFound(protocol.to_string()))?;
    let envelope: ConfigureEnvelope = crate::message::decode(&record.message)?;
    Ok(envelope.descriptor.definition)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProtocolDefinition {
        let mut child = BTreeMap::new();
        child.insert(
            "reply".to_string(),
            RuleSet {
                actions: vec![ActionRule { who: Actor::Author, of: Some("thread".to_string()), can: vec!["write".to_string()] }],
                ..Default::default()
            },
        );
        let mut structure = BTreeMap::new();
        structure.insert(
            "thread".to_string(),
            RuleSet {
                actions: vec![ActionRule { who: Actor::Anyone, of: None, can: vec!["write".to_string()] }],
                children: child,
                ..Default::default()
            },
        );
        ProtocolDefinition {
            protocol: "https://example.com/protocols/chat".to_string(),
            published: true,
            types: BTreeMap::new(),
            structure,
        }
    }

    #[test]
    fn validate_accepts_absolute_url() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_url_protocol() {
        let mut protocol = sample();
        protocol.protocol = "not-a-url".to_string();
        assert!(protocol.validate().is_err());
    }

    #[test]
    fn rule_set_at_walks_nested_path() {
        let protocol = sample();
        let rule_set = protocol.rule_set_at("thread/reply").unwrap();
        assert_eq!(rule_set.actions[0].who, Actor::Author);
    }

    #[test]
    fn rule_set_at_unknown_path_errors() {
        assert!(sample().rule_set_at("thread/missing").is_err());
    }

    #[test]
    fn normalize_uri_strips_trailing_slash() {
        assert_eq!(normalize_uri("https://example.com/protocols/chat/").unwrap(), "https://example.com/protocols/chat");
    }

    #[test]
    fn normalize_uri_adds_implicit_scheme() {
        assert_eq!(normalize_uri("example.com/protocols/chat").unwrap(), "http://example.com/protocols/chat");
    }

    #[test]
    fn normalize_uri_strips_query_and_fragment() {
        assert_eq!(
            normalize_uri("https://example.com/protocols/chat?version=1#frag").unwrap(),
            "https://example.com/protocols/chat"
        );
    }

    #[test]
    fn validate_rejects_a_scheme_less_protocol() {
        let mut protocol = sample();
        protocol.protocol = "example.com/protocols/chat".to_string();
        assert!(protocol.validate().is_err());
    }

    #[test]
    fn check_conformance_accepts_a_matching_schema_and_data_format() {
        let rule_set = RuleSet { schema: Some("s1".to_string()), data_format: Some("application/json".to_string()), ..Default::default() };
        assert!(rule_set.check_conformance(Some("s1"), "application/json").is_ok());
    }

    #[test]
    fn check_conformance_rejects_a_mismatched_schema() {
        let rule_set = RuleSet { schema: Some("s1".to_string()), ..Default::default() };
        assert!(rule_set.check_conformance(Some("s2"), "application/json").is_err());
        assert!(rule_set.check_conformance(None, "application/json").is_err());
    }

    #[test]
    fn check_conformance_rejects_a_mismatched_data_format() {
        let rule_set = RuleSet { data_format: Some("application/json".to_string()), ..Default::default() };
        assert!(rule_set.check_conformance(None, "text/plain").is_err());
    }

    #[test]
    fn check_conformance_imposes_no_constraint_when_unset() {
        let rule_set = RuleSet::default();
        assert!(rule_set.check_conformance(None, "anything").is_ok());
    }

    #[test]
    fn validate_rejects_a_trailing_slash() {
        let mut protocol = sample();
        protocol.protocol = format!("{}/", protocol.protocol);
        assert!(protocol.validate().is_err());
    }

    #[tokio::test]
    async fn load_definition_finds_the_stored_configure() {
        use crate::store::{IndexValue, InMemoryMessageStore, MessageStore};

        let store = InMemoryMessageStore::new();
        let definition = sample();
        let descriptor = serde_json::json!({
            "interface": "Protocols",
            "method": "Configure",
            "messageTimestamp": "2024-01-01T00:00:00.000001Z",
            "definition": definition,
        });
        let message = serde_json::json!({"descriptor": descriptor});
        let bytes = crate::message::encode(&message).unwrap();

        let mut filter = std::collections::BTreeMap::new();
        filter.insert("interface".to_string(), IndexValue::Text("Protocols".to_string()));
        filter.insert("method".to_string(), IndexValue::Text("Configure".to_string()));
        filter.insert("protocol".to_string(), IndexValue::Text(definition.protocol.clone()));
        store.put("did:example:alice", "bafyconfigure", filter, bytes).await.unwrap();

        let loaded = load_definition(&store, "did:example:alice", &definition.protocol).await.unwrap();
        assert_eq!(loaded.protocol, definition.protocol);

        let missing = load_definition(&store, "did:example:alice", "https://example.com/protocols/nope").await;
        assert!(missing.is_err());
    }
}
