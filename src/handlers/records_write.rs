//! `RecordsWrite`: the initial or overlay write to a record (spec §3,
//! §4.5). The first write to a `recordId` defines it as `cid(descriptor)`;
//! every later write must name that same `recordId` and win "newest wins"
//! against every existing write/delete sharing it.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::message::{
    cid as message_cid, encode, now_timestamp, validate_timestamp, DescriptorFields, Interface, Method,
};
use crate::store::{DataStore, EventLog, IndexValue, MessageStore};
use crate::events::EventStream;

use super::{error_to_status, existing_record_entries, is_strictly_newer, newest, Error, RecordsMessage, Reply};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsWriteDescriptor {
    pub interface: Interface,
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub data_format: String,
    pub data_cid: String,
    pub data_size: u64,
    pub date_created: String,
    pub message_timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
}

impl DescriptorFields for RecordsWriteDescriptor {
    fn interface(&self) -> Interface {
        self.interface
    }
    fn method(&self) -> Method {
        self.method
    }
    fn message_timestamp(&self) -> &str {
        &self.message_timestamp
    }
}

impl RecordsWriteDescriptor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(data_format: impl Into<String>, data_cid: impl Into<String>, data_size: u64) -> Self {
        let now = now_timestamp();
        RecordsWriteDescriptor {
            interface: Interface::Records,
            method: Method::Write,
            protocol: None,
            protocol_path: None,
            recipient: None,
            schema: None,
            data_format: data_format.into(),
            data_cid: data_cid.into(),
            data_size,
            date_created: now.clone(),
            message_timestamp: now,
            parent_id: None,
            context_id: None,
            published: None,
            date_published: None,
        }
    }
}

pub type RecordsWriteMessage = RecordsMessage<RecordsWriteDescriptor>;

fn indexes(record_id: &str, descriptor: &RecordsWriteDescriptor, author: &str) -> BTreeMap<String, IndexValue> {
    let mut idx = BTreeMap::new();
    idx.insert("interface".to_string(), IndexValue::Text(Interface::Records.as_str().to_string()));
    idx.insert("method".to_string(), IndexValue::Text(Method::Write.as_str().to_string()));
    idx.insert("author".to_string(), IndexValue::Text(author.to_string()));
    idx.insert("recordId".to_string(), IndexValue::Text(record_id.to_string()));
    idx.insert("dataFormat".to_string(), IndexValue::Text(descriptor.data_format.clone()));
    idx.insert("dataSize".to_string(), IndexValue::Number(descriptor.data_size as f64));
    idx.insert("dateCreated".to_string(), IndexValue::Text(descriptor.date_created.clone()));
    idx.insert("messageTimestamp".to_string(), IndexValue::Text(descriptor.message_timestamp.clone()));
    idx.insert("published".to_string(), IndexValue::Bool(descriptor.published.unwrap_or(false)));
    if let Some(protocol) = &descriptor.protocol {
        idx.insert("protocol".to_string(), IndexValue::Text(protocol.clone()));
    }
    if let Some(path) = &descriptor.protocol_path {
        idx.insert("protocolPath".to_string(), IndexValue::Text(path.clone()));
    }
    if let Some(context_id) = &descriptor.context_id {
        idx.insert("contextId".to_string(), IndexValue::Text(context_id.clone()));
    }
    if let Some(schema) = &descriptor.schema {
        idx.insert("schema".to_string(), IndexValue::Text(schema.clone()));
    }
    if let Some(parent_id) = &descriptor.parent_id {
        idx.insert("parentId".to_string(), IndexValue::Text(parent_id.clone()));
    }
    if let Some(recipient) = &descriptor.recipient {
        idx.insert("recipient".to_string(), IndexValue::Text(recipient.clone()));
    }
    if let Some(date_published) = &descriptor.date_published {
        idx.insert("datePublished".to_string(), IndexValue::Text(date_published.clone()));
    }
    idx
}

pub async fn handle(
    message_store: &dyn MessageStore,
    data_store: &dyn DataStore,
    event_log: &dyn EventLog,
    event_stream: &EventStream,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: RecordsWriteMessage,
    data: Option<Vec<u8>>,
) -> Reply {
    match run(message_store, data_store, event_log, event_stream, did_resolver, tenant, message, data).await {
        Ok(reply) => reply,
        Err(err) => Reply::status(error_to_status(&err)),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    message_store: &dyn MessageStore,
    data_store: &dyn DataStore,
    event_log: &dyn EventLog,
    event_stream: &EventStream,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: RecordsWriteMessage,
    data: Option<Vec<u8>>,
) -> Result<Reply, Error> {
    // PARSE
    crate::schema::known::validate("RecordsWrite", &message.message.descriptor)?;
    validate_timestamp(&message.message.descriptor.message_timestamp)?;
    validate_timestamp(&message.message.descriptor.date_created)?;
    if let Some(date_published) = &message.message.descriptor.date_published {
        validate_timestamp(date_published)?;
    }

    // AUTHENTICATE
    message.message.verify_authorization(did_resolver).await?;
    let auth = message.message.authorization.as_ref().expect("verify_authorization checked this");
    let author = auth.author()?;

    let descriptor = &message.message.descriptor;

    // AUTHORIZE
    let protocol_definition = match &descriptor.protocol {
        Some(protocol) => Some(crate::protocol::load_definition(message_store, tenant, protocol).await?),
        None => None,
    };

    if !crate::auth::is_tenant_shortcut(tenant, &author) {
        let payload = auth.signature_payload()?;
        let grant_id = payload.permission_grant_id.ok_or(crate::auth::Error::NotAuthorized)?;
        let grant =
            crate::auth::grant::check_grant(message_store, tenant, &grant_id, &author, Interface::Records, Method::Write)
                .await?;
        let protocol = descriptor.protocol.clone().ok_or(crate::auth::Error::NotAuthorized)?;
        let scope_request = crate::auth::scope::RecordScopeRequest {
            protocol,
            protocol_path: descriptor.protocol_path.clone(),
            context_id: descriptor.context_id.clone(),
            record_id: Some(message.record_id.clone()),
            schema: descriptor.schema.clone(),
        };
        crate::auth::scope::check_records_scope(&grant, &scope_request)?;
        grant.check_conditions(descriptor.published.unwrap_or(false))?;

        let definition = protocol_definition.as_ref().expect("protocol presence checked above");
        let protocol_path = descriptor.protocol_path.as_deref().unwrap_or_default();
        crate::auth::rules::authorize_action(
            message_store,
            tenant,
            definition,
            protocol_path,
            "write",
            &author,
            &author,
            descriptor.recipient.as_deref(),
            descriptor.parent_id.clone(),
        )
        .await?;
    }

    // A protocol's declared per-type schema/dataFormat binds every write
    // under it, owner-authored or grant-authorized alike.
    if let Some(definition) = &protocol_definition {
        let protocol_path = descriptor.protocol_path.as_deref().unwrap_or_default();
        definition.rule_set_at(protocol_path)?.check_conformance(descriptor.schema.as_deref(), &descriptor.data_format)?;
    }

    // CONFLICT-RESOLVE
    let incoming_cid = message.full_cid()?;
    let existing = existing_record_entries(message_store, tenant, &message.record_id).await?;
    if existing.is_empty() {
        if message.record_id != incoming_cid {
            return Ok(Reply::bad_request("initial RecordsWrite must set recordId = cid(descriptor)"));
        }
    } else if let Some(current) = newest(&existing) {
        if !is_strictly_newer(&descriptor.message_timestamp, &incoming_cid, &current.timestamp, &current.cid) {
            return Ok(Reply::conflict("a newer record write or delete already exists for this recordId"));
        }
    }

    // PERSIST
    if let Some(bytes) = data {
        let result = data_store.put(tenant, &message.record_id, bytes).await?;
        if result.data_cid != descriptor.data_cid || result.data_size != descriptor.data_size {
            return Ok(Reply::bad_request("data does not match descriptor dataCid/dataSize"));
        }
    } else {
        data_store.associate(tenant, &message.record_id, &descriptor.data_cid).await?;
    }

    let idx = indexes(&message.record_id, descriptor, &author);
    let bytes = encode(&message)?;
    message_store.put(tenant, &incoming_cid, idx.clone(), bytes).await?;

    let to_prune: Vec<String> =
        existing.iter().map(|e| e.cid.clone()).filter(|cid| cid != &message.record_id).collect();
    for cid in &to_prune {
        message_store.delete(tenant, cid).await?;
    }

    // LOG-EVENT
    event_log.append(tenant, &incoming_cid, idx.clone()).await?;
    if !to_prune.is_empty() {
        event_log.delete_events_by_cid(tenant, &to_prune).await?;
    }

    // EMIT
    event_stream.emit(tenant, &incoming_cid, &idx).await;

    Ok(Reply::accepted())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Secp256k1Signer;
    use crate::did::{DidDocument, InMemoryDidResolver};
    use crate::message::SignaturePayload;
    use crate::store::{InMemoryDataStore, InMemoryEventLog, InMemoryMessageStore};
    use std::collections::HashMap;

    async fn resolver_for(tenant: &str, jwk: crate::crypto::Jwk) -> InMemoryDidResolver {
        let resolver = InMemoryDidResolver::new();
        let mut methods = HashMap::new();
        methods.insert("key-1".to_string(), jwk);
        resolver.register(DidDocument { id: tenant.to_string(), verification_methods: methods }).await;
        resolver
    }

    fn write_at(
        tenant: &str,
        key: &crate::crypto::secp256k1::SecretKey,
        record_id: Option<&str>,
        data_cid: &str,
        data_size: u64,
        ts: &str,
    ) -> RecordsWriteMessage {
        let signer = Secp256k1Signer { kid: format!("{tenant}#key-1"), key: key.clone() };
        let mut descriptor = RecordsWriteDescriptor::new("application/json", data_cid, data_size);
        descriptor.message_timestamp = ts.to_string();
        descriptor.date_created = ts.to_string();
        let record_id = record_id.map(|s| s.to_string()).unwrap_or_else(|| message_cid(&descriptor).unwrap());
        let mut wrapped = RecordsMessage::new(record_id, descriptor);
        let cid = wrapped.descriptor_cid().unwrap();
        wrapped.authorize(&signer, SignaturePayload::new(cid), None).unwrap();
        wrapped
    }

    #[tokio::test]
    async fn initial_write_establishes_record_id() {
        let tenant = "did:example:alice";
        let key = crate::crypto::secp256k1::SecretKey::generate();
        let resolver = resolver_for(tenant, key.jwk()).await;
        let store = InMemoryMessageStore::new();
        let data_store = InMemoryDataStore::new();
        let log = InMemoryEventLog::new();
        let events = EventStream::new();

        let data = b"hello".to_vec();
        let preview = data_store.put(tenant, "preview", data.clone()).await.unwrap();

        let signer = Secp256k1Signer { kid: format!("{tenant}#key-1"), key: key.clone() };
        let mut descriptor = RecordsWriteDescriptor::new("application/json", preview.data_cid.clone(), data.len() as u64);
        descriptor.message_timestamp = "2024-01-01T00:00:00.000001Z".to_string();
        descriptor.date_created = descriptor.message_timestamp.clone();
        let record_id = message_cid(&descriptor).unwrap();
        let mut write = RecordsMessage::new(record_id, descriptor);
        let cid = write.descriptor_cid().unwrap();
        write.authorize(&signer, SignaturePayload::new(cid), None).unwrap();

        let reply = handle(&store, &data_store, &log, &events, &resolver, tenant, write, Some(data)).await;
        assert_eq!(reply.status.code, 202);
    }

    #[tokio::test]
    async fn mismatched_initial_record_id_is_rejected() {
        let tenant = "did:example:alice";
        let key = crate::crypto::secp256k1::SecretKey::generate();
        let resolver = resolver_for(tenant, key.jwk()).await;
        let store = InMemoryMessageStore::new();
        let data_store = InMemoryDataStore::new();
        let log = InMemoryEventLog::new();
        let events = EventStream::new();

        let write = write_at(tenant, &key, Some("bafywrongid"), "bafkdata", 0, "2024-01-01T00:00:00.000001Z");
        let reply = handle(&store, &data_store, &log, &events, &resolver, tenant, write, Some(Vec::new())).await;
        assert_eq!(reply.status.code, 400);
    }

    #[tokio::test]
    async fn write_violating_the_protocol_s_declared_schema_is_rejected() {
        use crate::handlers::protocols_configure::{self, ProtocolsConfigureDescriptor};
        use crate::protocol::{ActionRule, Actor, ProtocolDefinition, RuleSet};
        use std::collections::BTreeMap as Map;

        let tenant = "did:example:alice";
        let key = crate::crypto::secp256k1::SecretKey::generate();
        let resolver = resolver_for(tenant, key.jwk()).await;
        let store = InMemoryMessageStore::new();
        let data_store = InMemoryDataStore::new();
        let log = InMemoryEventLog::new();
        let events = EventStream::new();
        let signer = Secp256k1Signer { kid: format!("{tenant}#key-1"), key: key.clone() };

        let mut structure = Map::new();
        structure.insert(
            "post".to_string(),
            RuleSet {
                actions: vec![ActionRule { who: Actor::Anyone, of: None, can: vec!["write".to_string()] }],
                schema: Some("https://example.com/schemas/post".to_string()),
                ..Default::default()
            },
        );
        let definition =
            ProtocolDefinition { protocol: "https://example.com/protocols/blog".to_string(), published: true, types: Map::new(), structure };
        let mut configure = crate::message::Message::new(ProtocolsConfigureDescriptor::new(definition));
        let cid = configure.descriptor_cid().unwrap();
        configure.authorize(&signer, SignaturePayload::new(cid), None).unwrap();
        protocols_configure::handle(&store, &log, &events, &resolver, tenant, configure).await;

        let data = b"hello".to_vec();
        let preview = data_store.put(tenant, "preview", data.clone()).await.unwrap();
        let mut descriptor = RecordsWriteDescriptor::new("application/json", preview.data_cid.clone(), data.len() as u64);
        descriptor.message_timestamp = "2024-01-02T00:00:00.000001Z".to_string();
        descriptor.date_created = descriptor.message_timestamp.clone();
        descriptor.protocol = Some("https://example.com/protocols/blog".to_string());
        descriptor.protocol_path = Some("post".to_string());
        descriptor.schema = Some("https://example.com/schemas/wrong".to_string());
        let record_id = message_cid(&descriptor).unwrap();
        let mut write = RecordsMessage::new(record_id, descriptor);
        let cid = write.descriptor_cid().unwrap();
        write.authorize(&signer, SignaturePayload::new(cid), None).unwrap();

        let reply = handle(&store, &data_store, &log, &events, &resolver, tenant, write, Some(data)).await;
        assert_eq!(reply.status.code, 400);
    }

    #[tokio::test]
    async fn grant_requiring_publication_rejects_an_unpublished_write() {
        use crate::handlers::protocols_configure::{self, ProtocolsConfigureDescriptor};
        use crate::permission::{Conditions, PermissionGrant, ProtocolPermissionScope, Scope};
        use crate::protocol::{ActionRule, Actor, ProtocolDefinition, RuleSet};
        use std::collections::BTreeMap as Map;

        let tenant = "did:example:alice";
        let alice_key = crate::crypto::secp256k1::SecretKey::generate();
        let bob_key = crate::crypto::secp256k1::SecretKey::generate();
        let resolver = InMemoryDidResolver::new();
        let mut alice_methods = HashMap::new();
        alice_methods.insert("key-1".to_string(), alice_key.jwk());
        resolver.register(DidDocument { id: tenant.to_string(), verification_methods: alice_methods }).await;
        let mut bob_methods = HashMap::new();
        bob_methods.insert("key-1".to_string(), bob_key.jwk());
        resolver.register(DidDocument { id: "did:example:bob".to_string(), verification_methods: bob_methods }).await;
        let store = InMemoryMessageStore::new();
        let data_store = InMemoryDataStore::new();
        let log = InMemoryEventLog::new();
        let events = EventStream::new();
        let alice_signer = Secp256k1Signer { kid: format!("{tenant}#key-1"), key: alice_key };
        let signer = Secp256k1Signer { kid: "did:example:bob#key-1".to_string(), key: bob_key };

        let mut structure = Map::new();
        structure.insert(
            "post".to_string(),
            RuleSet {
                actions: vec![ActionRule { who: Actor::Anyone, of: None, can: vec!["write".to_string()] }],
                ..Default::default()
            },
        );
        let definition =
            ProtocolDefinition { protocol: "https://example.com/protocols/blog".to_string(), published: true, types: Map::new(), structure };
        let mut configure = crate::message::Message::new(ProtocolsConfigureDescriptor::new(definition));
        let cid = configure.descriptor_cid().unwrap();
        configure.authorize(&alice_signer, SignaturePayload::new(cid), None).unwrap();
        protocols_configure::handle(&store, &log, &events, &resolver, tenant, configure).await;

        let grant = PermissionGrant {
            id: "grant-1".to_string(),
            grantor: tenant.to_string(),
            grantee: "did:example:bob".to_string(),
            date_granted: "2024-01-01T00:00:00.000000Z".to_string(),
            date_expires: "2999-01-01T00:00:00.000000Z".to_string(),
            scope: Scope {
                interface: Interface::Records,
                method: Method::Write,
                protocol: Some(ProtocolPermissionScope {
                    protocol: "https://example.com/protocols/blog".to_string(),
                    protocol_path: None,
                    context_id: None,
                    record_id: None,
                    schema: None,
                }),
            },
            conditions: Conditions { publication: Some(true) },
        };
        let bytes = crate::message::encode(&grant).unwrap();
        store.put(tenant, "grant-1", std::collections::BTreeMap::new(), bytes).await.unwrap();

        let data = b"hello".to_vec();
        let preview = data_store.put(tenant, "preview", data.clone()).await.unwrap();
        let mut descriptor = RecordsWriteDescriptor::new("application/json", preview.data_cid.clone(), data.len() as u64);
        descriptor.message_timestamp = "2024-01-02T00:00:00.000001Z".to_string();
        descriptor.date_created = descriptor.message_timestamp.clone();
        descriptor.protocol = Some("https://example.com/protocols/blog".to_string());
        descriptor.protocol_path = Some("post".to_string());
        descriptor.published = Some(false);
        let record_id = message_cid(&descriptor).unwrap();
        let mut write = RecordsMessage::new(record_id, descriptor);
        let cid = write.descriptor_cid().unwrap();
        let payload = SignaturePayload::new(cid).with_permission_grant_id("grant-1");
        write.authorize(&signer, payload, None).unwrap();

        let reply = handle(&store, &data_store, &log, &events, &resolver, tenant, write, Some(data)).await;
        assert_eq!(reply.status.code, 401);
    }
}
