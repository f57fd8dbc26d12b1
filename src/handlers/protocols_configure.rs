//! `ProtocolsConfigure`: installs or replaces the rule tree a tenant's
//! `Records*` messages are authorized against (spec §4.5).
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::message::{encode, now_timestamp, validate_timestamp, DescriptorFields, Interface, Message, Method};
use crate::protocol::ProtocolDefinition;
use crate::store::{Filter, FilterValue, IndexValue, MessageStore, QueryOptions};
use crate::events::EventStream;
use crate::store::EventLog;

use super::{error_to_status, is_strictly_newer, Error, Reply};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolsConfigureDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    pub definition: ProtocolDefinition,
}

impl DescriptorFields for ProtocolsConfigureDescriptor {
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

impl ProtocolsConfigureDescriptor {
    pub fn new(definition: ProtocolDefinition) -> Self {
        ProtocolsConfigureDescriptor {
            interface: Interface::Protocols,
            method: Method::Configure,
            message_timestamp: now_timestamp(),
            definition,
        }
    }
}

pub type ProtocolsConfigureMessage = Message<ProtocolsConfigureDescriptor>;

fn indexes(descriptor: &ProtocolsConfigureDescriptor, author: &str) -> BTreeMap<String, IndexValue> {
    let mut idx = BTreeMap::new();
    idx.insert("interface".to_string(), IndexValue::Text(Interface::Protocols.as_str().to_string()));
    idx.insert("method".to_string(), IndexValue::Text(Method::Configure.as_str().to_string()));
    idx.insert("author".to_string(), IndexValue::Text(author.to_string()));
    idx.insert("protocol".to_string(), IndexValue::Text(descriptor.definition.protocol.clone()));
    idx.insert("published".to_string(), IndexValue::Bool(descriptor.definition.published));
    idx.insert("messageTimestamp".to_string(), IndexValue::Text(descriptor.message_timestamp.clone()));
    idx
}

async fn existing_configures(
    message_store: &dyn MessageStore,
    tenant: &str,
    protocol: &str,
) -> Result<Vec<(String, String)>, Error> {
    let mut filter = Filter::new();
    filter.insert("interface".to_string(), FilterValue::Equal(IndexValue::Text("Protocols".to_string())));
    filter.insert("method".to_string(), FilterValue::Equal(IndexValue::Text("Configure".to_string())));
    filter.insert("protocol".to_string(), FilterValue::Equal(IndexValue::Text(protocol.to_string())));
    let (results, _) = message_store.query(tenant, &vec![filter], &QueryOptions::default()).await?;
    Ok(results
        .into_iter()
        .filter_map(|record| {
            let ts = record.indexes.get("messageTimestamp").and_then(|v| match v {
                IndexValue::Text(s) => Some(s.clone()),
                _ => None,
            })?;
            Some((record.cid, ts))
        })
        .collect())
}

pub async fn handle(
    message_store: &dyn MessageStore,
    event_log: &dyn EventLog,
    event_stream: &EventStream,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: ProtocolsConfigureMessage,
) -> Reply {
    match run(message_store, event_log, event_stream, did_resolver, tenant, message).await {
        Ok(reply) => reply,
        Err(err) => Reply::status(error_to_status(&err)),
    }
}

async fn run(
    message_store: &dyn MessageStore,
    event_log: &dyn EventLog,
    event_stream: &EventStream,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: ProtocolsConfigureMessage,
) -> Result<Reply, Error> {
    // PARSE
    crate::schema::known::validate("ProtocolsConfigure", &message.descriptor)?;
    validate_timestamp(&message.descriptor.message_timestamp)?;
    message.descriptor.definition.validate()?;

    // AUTHENTICATE
    message.verify_authorization(did_resolver).await?;
    let auth = message.authorization.as_ref().expect("verify_authorization checked this");
    let author = auth.author()?;

    // AUTHORIZE
    if !crate::auth::is_tenant_shortcut(tenant, &author) {
        let payload = auth.signature_payload()?;
        let grant_id = payload.permission_grant_id.ok_or(crate::auth::Error::NotAuthorized)?;
        let grant =
            crate::auth::grant::check_grant(message_store, tenant, &grant_id, &author, Interface::Protocols, Method::Configure)
                .await?;
        crate::auth::scope::check_protocols_configure_scope(&grant, &message.descriptor.definition.protocol)?;
    }

    // CONFLICT-RESOLVE
    let incoming_cid = message.full_cid()?;
    let existing = existing_configures(message_store, tenant, &message.descriptor.definition.protocol).await?;
    for (_, ts) in &existing {
        if !is_strictly_newer(&message.descriptor.message_timestamp, &incoming_cid, ts, "") {
            return Ok(Reply::conflict("a newer ProtocolsConfigure already exists for this protocol"));
        }
    }

    // PERSIST
    let idx = indexes(&message.descriptor, &author);
    let bytes = encode(&message)?;
    message_store.put(tenant, &incoming_cid, idx.clone(), bytes).await?;
    for (cid, _) in &existing {
        message_store.delete(tenant, cid).await?;
    }

    // LOG-EVENT
    event_log.append(tenant, &incoming_cid, idx.clone()).await?;
    if !existing.is_empty() {
        let older_cids: Vec<String> = existing.iter().map(|(cid, _)| cid.clone()).collect();
        event_log.delete_events_by_cid(tenant, &older_cids).await?;
    }

    // EMIT
    event_stream.emit(tenant, &incoming_cid, &idx).await;

    Ok(Reply::accepted())
}
