//! `RecordsDelete`: tombstones a record's logical key. Stored through the
//! same `RecordsMessage` envelope `RecordsWrite` uses, sharing its
//! `recordId`, so a later write or delete still competes against it under
//! "newest wins" (spec §3, §4.5).
//!
//! A delete of an already-deleted record is not rejected: a strictly
//! newer tombstone simply replaces the older one, same as an overlay
//! write replacing a prior write. Only a delete that is not strictly
//! newer than the current tombstone is a conflict.
use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::message::{
    cid as message_cid, decode, encode, validate_timestamp, DescriptorFields, Interface, Method,
};
use crate::store::{DataStore, EventLog, IndexValue, MessageStore};
use crate::events::EventStream;

use super::records_write::RecordsWriteMessage;
use super::{error_to_status, existing_record_entries, is_strictly_newer, newest, Error, RecordsMessage, Reply};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsDeleteDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
}

impl DescriptorFields for RecordsDeleteDescriptor {
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

impl RecordsDeleteDescriptor {
    pub fn new(message_timestamp: impl Into<String>) -> Self {
        RecordsDeleteDescriptor { interface: Interface::Records, method: Method::Delete, message_timestamp: message_timestamp.into() }
    }
}

pub type RecordsDeleteMessage = RecordsMessage<RecordsDeleteDescriptor>;

pub async fn handle(
    message_store: &dyn MessageStore,
    data_store: &dyn DataStore,
    event_log: &dyn EventLog,
    event_stream: &EventStream,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: RecordsDeleteMessage,
) -> Reply {
    match run(message_store, data_store, event_log, event_stream, did_resolver, tenant, message).await {
        Ok(reply) => reply,
        Err(err) => Reply::status(error_to_status(&err)),
    }
}

async fn run(
    message_store: &dyn MessageStore,
    data_store: &dyn DataStore,
    event_log: &dyn EventLog,
    event_stream: &EventStream,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: RecordsDeleteMessage,
) -> Result<Reply, Error> {
    // PARSE
    crate::schema::known::validate("RecordsDelete", &message.message.descriptor)?;
    validate_timestamp(&message.message.descriptor.message_timestamp)?;

    // AUTHENTICATE
    message.message.verify_authorization(did_resolver).await?;
    let auth = message.message.authorization.as_ref().expect("verify_authorization checked this");
    let author = auth.author()?;

    let record_id = &message.record_id;
    let existing = existing_record_entries(message_store, tenant, record_id).await?;
    let Some(current) = newest(&existing) else {
        return Ok(Reply::not_found(format!("no record found for {record_id}")));
    };

    let anchor = message_store
        .get(tenant, record_id)
        .await?
        .ok_or_else(|| Error::RecordNotFound(record_id.clone()))?;
    let anchor_write: RecordsWriteMessage = decode(&anchor.message)?;
    let anchor_descriptor = &anchor_write.message.descriptor;

    // AUTHORIZE
    if !crate::auth::is_tenant_shortcut(tenant, &author) {
        let payload = auth.signature_payload()?;
        let grant_id = payload.permission_grant_id.ok_or(crate::auth::Error::NotAuthorized)?;
        let grant =
            crate::auth::grant::check_grant(message_store, tenant, &grant_id, &author, Interface::Records, Method::Delete)
                .await?;
        let protocol = anchor_descriptor.protocol.clone().ok_or(crate::auth::Error::NotAuthorized)?;
        let scope_request = crate::auth::scope::RecordScopeRequest {
            protocol: protocol.clone(),
            protocol_path: anchor_descriptor.protocol_path.clone(),
            context_id: anchor_descriptor.context_id.clone(),
            record_id: Some(record_id.clone()),
            schema: anchor_descriptor.schema.clone(),
        };
        crate::auth::scope::check_records_scope(&grant, &scope_request)?;

        let record_author = match anchor.indexes.get("author") {
            Some(IndexValue::Text(s)) => s.clone(),
            _ => author.clone(),
        };
        let definition = crate::protocol::load_definition(message_store, tenant, &protocol).await?;
        let protocol_path = anchor_descriptor.protocol_path.as_deref().unwrap_or_default();
        crate::auth::rules::authorize_action(
            message_store,
            tenant,
            &definition,
            protocol_path,
            "delete",
            &author,
            &record_author,
            anchor_descriptor.recipient.as_deref(),
            anchor_descriptor.parent_id.clone(),
        )
        .await?;
    }

    // CONFLICT-RESOLVE
    let descriptor = &message.message.descriptor;
    let incoming_cid = message.full_cid()?;
    if !is_strictly_newer(&descriptor.message_timestamp, &incoming_cid, &current.timestamp, &current.cid) {
        return Ok(Reply::conflict("a newer record write or delete already exists for this recordId"));
    }

    // PERSIST
    if !current.is_delete {
        if let Some(current_record) = message_store.get(tenant, &current.cid).await? {
            if let Ok(current_write) = decode::<RecordsWriteMessage>(&current_record.message) {
                data_store.delete(tenant, record_id, &current_write.message.descriptor.data_cid).await?;
            }
        }
    }

    let mut idx = std::collections::BTreeMap::new();
    idx.insert("interface".to_string(), IndexValue::Text(Interface::Records.as_str().to_string()));
    idx.insert("method".to_string(), IndexValue::Text(Method::Delete.as_str().to_string()));
    idx.insert("author".to_string(), IndexValue::Text(author.clone()));
    idx.insert("recordId".to_string(), IndexValue::Text(record_id.clone()));
    idx.insert("messageTimestamp".to_string(), IndexValue::Text(descriptor.message_timestamp.clone()));

    let bytes = encode(&message)?;
    message_store.put(tenant, &incoming_cid, idx.clone(), bytes).await?;

    let to_prune: Vec<String> = existing.iter().map(|e| e.cid.clone()).filter(|cid| cid != record_id).collect();
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
