//! `EventsQuery`: replays the append-only event log in watermark order,
//! filtered and optionally scoped to a protocol (spec §4.3, §4.6).
use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::message::{validate_timestamp, DescriptorFields, Interface, Message, Method};
use crate::store::{Cursor, EventLog, Filter, FilterValue, IndexValue, MessageStore};

use super::{error_to_status, Error, QueryEntry, Reply};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<Interface>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQueryDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    #[serde(default)]
    pub filters: Vec<EventsFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<u64>,
}

impl DescriptorFields for EventsQueryDescriptor {
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

pub type EventsQueryMessage = Message<EventsQueryDescriptor>;

pub(crate) fn build_filters(filters: &[EventsFilter]) -> Vec<Filter> {
    filters
        .iter()
        .map(|f| {
            let mut filter = Filter::new();
            if let Some(protocol) = &f.protocol {
                filter.insert("protocol".to_string(), FilterValue::Equal(IndexValue::Text(protocol.clone())));
            }
            if let Some(interface) = &f.interface {
                filter.insert("interface".to_string(), FilterValue::Equal(IndexValue::Text(interface.as_str().to_string())));
            }
            if let Some(method) = &f.method {
                filter.insert("method".to_string(), FilterValue::Equal(IndexValue::Text(method.as_str().to_string())));
            }
            if let Some(record_id) = &f.record_id {
                filter.insert("recordId".to_string(), FilterValue::Equal(IndexValue::Text(record_id.clone())));
            }
            if let Some(schema) = &f.schema {
                filter.insert("schema".to_string(), FilterValue::Equal(IndexValue::Text(schema.clone())));
            }
            filter
        })
        .collect()
}

pub async fn handle(
    message_store: &dyn MessageStore,
    event_log: &dyn EventLog,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: EventsQueryMessage,
) -> Reply {
    match run(message_store, event_log, did_resolver, tenant, message).await {
        Ok(reply) => reply,
        Err(err) => Reply::status(error_to_status(&err)),
    }
}

async fn run(
    message_store: &dyn MessageStore,
    event_log: &dyn EventLog,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: EventsQueryMessage,
) -> Result<Reply, Error> {
    crate::schema::known::validate("EventsQuery", &message.descriptor)?;
    validate_timestamp(&message.descriptor.message_timestamp)?;
    message.verify_authorization(did_resolver).await?;
    let auth = message.authorization.as_ref().expect("verify_authorization checked this");
    let author = auth.author()?;

    let owner = crate::auth::is_tenant_shortcut(tenant, &author);
    if !owner {
        let payload = auth.signature_payload()?;
        let grant_id = payload.permission_grant_id.ok_or(crate::auth::Error::NotAuthorized)?;
        let grant =
            crate::auth::grant::check_grant(message_store, tenant, &grant_id, &author, Interface::Events, Method::Query)
                .await?;
        if message.descriptor.filters.is_empty() {
            return Err(crate::auth::Error::NotAuthorized.into());
        }
        let protocols: Vec<Option<String>> = message.descriptor.filters.iter().map(|f| f.protocol.clone()).collect();
        crate::auth::scope::check_events_query_scope(&grant, &protocols)?;
    }

    let filters = build_filters(&message.descriptor.filters);
    let events = event_log.query_events(tenant, &filters, message.descriptor.cursor).await?;

    let mut entries = Vec::with_capacity(events.len());
    let mut last_watermark = None;
    for event in &events {
        if let Some(record) = message_store.get(tenant, &event.cid).await? {
            entries.push(QueryEntry { message_cid: event.cid.clone(), message: record.message });
        }
        last_watermark = Some(event.watermark);
    }

    let cursor = events.last().map(|last| Cursor { value: IndexValue::Number(last.watermark as f64), message_cid: last.cid.clone() });
    let _ = last_watermark;
    Ok(Reply::query(entries, cursor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Secp256k1Signer;
    use crate::did::{DidDocument, InMemoryDidResolver};
    use crate::message::{now_timestamp, SignaturePayload};
    use crate::store::{InMemoryEventLog, InMemoryMessageStore};
    use std::collections::{BTreeMap, HashMap};

    async fn resolver_for(tenant: &str, jwk: crate::crypto::Jwk) -> InMemoryDidResolver {
        let resolver = InMemoryDidResolver::new();
        let mut methods = HashMap::new();
        methods.insert("key-1".to_string(), jwk);
        resolver.register(DidDocument { id: tenant.to_string(), verification_methods: methods }).await;
        resolver
    }

    fn query_message(tenant: &str, key: &crate::crypto::secp256k1::SecretKey, cursor: Option<u64>) -> EventsQueryMessage {
        let signer = Secp256k1Signer { kid: format!("{tenant}#key-1"), key: key.clone() };
        let descriptor =
            EventsQueryDescriptor { interface: Interface::Events, method: Method::Query, message_timestamp: now_timestamp(), filters: Vec::new(), cursor };
        let mut message = Message::new(descriptor);
        let cid = message.descriptor_cid().unwrap();
        message.authorize(&signer, SignaturePayload::new(cid), None).unwrap();
        message
    }

    #[tokio::test]
    async fn owner_replays_the_full_log_and_can_resume_from_a_cursor() {
        let tenant = "did:example:alice";
        let key = crate::crypto::secp256k1::SecretKey::generate();
        let resolver = resolver_for(tenant, key.jwk()).await;
        let store = InMemoryMessageStore::new();
        let log = InMemoryEventLog::new();

        for cid in ["cid-1", "cid-2"] {
            store.put(tenant, cid, BTreeMap::new(), vec![]).await.unwrap();
            log.append(tenant, cid, BTreeMap::new()).await.unwrap();
        }

        let reply = handle(&store, &log, &resolver, tenant, query_message(tenant, &key, None)).await;
        assert_eq!(reply.status.code, 200);
        assert_eq!(reply.entries.len(), 2);

        let resume_cursor = reply.cursor.clone().map(|c| match c.value {
            IndexValue::Number(n) => n as u64,
            _ => panic!("expected a numeric watermark cursor"),
        });
        assert_eq!(resume_cursor, Some(1));

        let reply = handle(&store, &log, &resolver, tenant, query_message(tenant, &key, resume_cursor)).await;
        assert_eq!(reply.entries.len(), 0);
    }
}
