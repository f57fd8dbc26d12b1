//! `RecordsQuery`: translates the descriptor's filter into the store's
//! filter grammar, restricting non-owners to `published = true` unless a
//! protocol-scoped grant says otherwise (spec §4.5).
use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::message::{validate_timestamp, DescriptorFields, Interface, Method};
use crate::store::{Filter, FilterValue, IndexValue, MessageStore, QueryOptions};

use super::{error_to_status, Error, QueryEntry, Reply};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsQueryFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsQueryDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    #[serde(default)]
    pub filter: RecordsQueryFilter,
}

impl DescriptorFields for RecordsQueryDescriptor {
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

pub type RecordsQueryMessage = crate::message::Message<RecordsQueryDescriptor>;

/// `may_see_unpublished` is true for the tenant itself and for any
/// requester whose grant scope was just confirmed to cover this query's
/// protocol — a grant that unlocks a protocol's records unlocks its
/// unpublished ones too, same as the tenant's own view of them.
pub(crate) fn build_filter(query: &RecordsQueryFilter, may_see_unpublished: bool) -> Filter {
    let mut filter = Filter::new();
    filter.insert("interface".to_string(), FilterValue::Equal(IndexValue::Text(Interface::Records.as_str().to_string())));
    filter.insert("method".to_string(), FilterValue::Equal(IndexValue::Text(Method::Write.as_str().to_string())));
    if let Some(protocol) = &query.protocol {
        filter.insert("protocol".to_string(), FilterValue::Equal(IndexValue::Text(protocol.clone())));
    }
    if let Some(path) = &query.protocol_path {
        filter.insert("protocolPath".to_string(), FilterValue::Equal(IndexValue::Text(path.clone())));
    }
    if let Some(context_id) = &query.context_id {
        filter.insert("contextId".to_string(), FilterValue::Equal(IndexValue::Text(context_id.clone())));
    }
    if let Some(schema) = &query.schema {
        filter.insert("schema".to_string(), FilterValue::Equal(IndexValue::Text(schema.clone())));
    }
    if let Some(record_id) = &query.record_id {
        filter.insert("recordId".to_string(), FilterValue::Equal(IndexValue::Text(record_id.clone())));
    }
    if !may_see_unpublished {
        filter.insert("published".to_string(), FilterValue::Equal(IndexValue::Bool(true)));
    }
    filter
}

pub async fn handle(
    message_store: &dyn MessageStore,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: RecordsQueryMessage,
) -> Reply {
    match run(message_store, did_resolver, tenant, message).await {
        Ok(reply) => reply,
        Err(err) => Reply::status(error_to_status(&err)),
    }
}

async fn run(
    message_store: &dyn MessageStore,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: RecordsQueryMessage,
) -> Result<Reply, Error> {
    crate::schema::known::validate("RecordsQuery", &message.descriptor)?;
    validate_timestamp(&message.descriptor.message_timestamp)?;
    message.verify_authorization(did_resolver).await?;
    let auth = message.authorization.as_ref().expect("verify_authorization checked this");
    let author = auth.author()?;

    let owner = crate::auth::is_tenant_shortcut(tenant, &author);
    let mut grant_unlocks_scope = false;
    if !owner {
        let payload = auth.signature_payload()?;
        if let Some(grant_id) = payload.permission_grant_id {
            let grant =
                crate::auth::grant::check_grant(message_store, tenant, &grant_id, &author, Interface::Records, Method::Query)
                    .await?;
            if let Some(protocol) = &message.descriptor.filter.protocol {
                let scope_request = crate::auth::scope::RecordScopeRequest {
                    protocol: protocol.clone(),
                    protocol_path: message.descriptor.filter.protocol_path.clone(),
                    context_id: message.descriptor.filter.context_id.clone(),
                    record_id: message.descriptor.filter.record_id.clone(),
                    schema: message.descriptor.filter.schema.clone(),
                };
                crate::auth::scope::check_records_scope(&grant, &scope_request)?;
                grant_unlocks_scope = true;
            }
        }
    }

    let filter = build_filter(&message.descriptor.filter, owner || grant_unlocks_scope);
    let (results, cursor) = message_store.query(tenant, &vec![filter], &QueryOptions::default()).await?;
    let entries = results
        .into_iter()
        .map(|record| QueryEntry { message_cid: record.cid, message: record.message })
        .collect();
    Ok(Reply::query(entries, cursor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Secp256k1Signer;
    use crate::did::{DidDocument, InMemoryDidResolver};
    use crate::message::{now_timestamp, Message, SignaturePayload};
    use std::collections::HashMap;

    async fn resolver_for(tenant: &str, jwk: crate::crypto::Jwk) -> InMemoryDidResolver {
        let resolver = InMemoryDidResolver::new();
        let mut methods = HashMap::new();
        methods.insert("key-1".to_string(), jwk);
        resolver.register(DidDocument { id: tenant.to_string(), verification_methods: methods }).await;
        resolver
    }

    fn query_message(tenant: &str, key: &crate::crypto::secp256k1::SecretKey, filter: RecordsQueryFilter) -> RecordsQueryMessage {
        let signer = Secp256k1Signer { kid: format!("{tenant}#key-1"), key: key.clone() };
        let descriptor =
            RecordsQueryDescriptor { interface: Interface::Records, method: Method::Query, message_timestamp: now_timestamp(), filter };
        let mut message = Message::new(descriptor);
        let cid = message.descriptor_cid().unwrap();
        message.authorize(&signer, SignaturePayload::new(cid), None).unwrap();
        message
    }

    #[tokio::test]
    async fn non_owner_only_sees_published_records() {
        let tenant = "did:example:alice";
        let bob_key = crate::crypto::secp256k1::SecretKey::generate();
        let resolver = resolver_for("did:example:bob", bob_key.jwk()).await;
        let store = crate::store::InMemoryMessageStore::new();

        let mut published = std::collections::BTreeMap::new();
        published.insert("interface".to_string(), IndexValue::Text("Records".to_string()));
        published.insert("method".to_string(), IndexValue::Text("Write".to_string()));
        published.insert("published".to_string(), IndexValue::Bool(true));
        store.put(tenant, "cid-published", published, vec![1]).await.unwrap();

        let mut unpublished = std::collections::BTreeMap::new();
        unpublished.insert("interface".to_string(), IndexValue::Text("Records".to_string()));
        unpublished.insert("method".to_string(), IndexValue::Text("Write".to_string()));
        unpublished.insert("published".to_string(), IndexValue::Bool(false));
        store.put(tenant, "cid-unpublished", unpublished, vec![2]).await.unwrap();

        let query = query_message("did:example:bob", &bob_key, RecordsQueryFilter::default());
        let reply = handle(&store, &resolver, tenant, query).await;
        assert_eq!(reply.status.code, 200);
        assert_eq!(reply.entries.len(), 1);
        assert_eq!(reply.entries[0].message_cid, "cid-published");
    }
}
