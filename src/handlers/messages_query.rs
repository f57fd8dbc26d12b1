//! `MessagesQuery`: the raw sync interface over everything the tenant's
//! DWN holds, unlike `RecordsQuery` it is not narrowed to `published`
//! records — a grant authorizes the whole interface/method pair, and
//! only scopes down further when the caller's own filter names a
//! protocol (spec §4.3, §4.5).
use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::message::{validate_timestamp, DescriptorFields, Interface, Message, Method};
use crate::store::{Filter, FilterValue, IndexValue, MessageStore, QueryOptions};

use super::{error_to_status, Error, QueryEntry, Reply};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesQueryFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<Interface>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesQueryDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    #[serde(default)]
    pub filters: Vec<MessagesQueryFilter>,
}

impl DescriptorFields for MessagesQueryDescriptor {
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

pub type MessagesQueryMessage = Message<MessagesQueryDescriptor>;

pub(crate) fn build_filters(filters: &[MessagesQueryFilter]) -> Vec<Filter> {
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
            filter
        })
        .collect()
}

pub async fn handle(
    message_store: &dyn MessageStore,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: MessagesQueryMessage,
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
    message: MessagesQueryMessage,
) -> Result<Reply, Error> {
    crate::schema::known::validate("MessagesQuery", &message.descriptor)?;
    validate_timestamp(&message.descriptor.message_timestamp)?;
    message.verify_authorization(did_resolver).await?;
    let auth = message.authorization.as_ref().expect("verify_authorization checked this");
    let author = auth.author()?;

    if !crate::auth::is_tenant_shortcut(tenant, &author) {
        let payload = auth.signature_payload()?;
        let grant_id = payload.permission_grant_id.ok_or(crate::auth::Error::NotAuthorized)?;
        let grant =
            crate::auth::grant::check_grant(message_store, tenant, &grant_id, &author, Interface::Messages, Method::Query)
                .await?;
        let protocols: Vec<Option<String>> = message.descriptor.filters.iter().map(|f| f.protocol.clone()).collect();
        if protocols.iter().any(Option::is_some) {
            crate::auth::scope::check_events_query_scope(&grant, &protocols)?;
        }
    }

    let filters = build_filters(&message.descriptor.filters);
    let options = QueryOptions::default();
    let (results, cursor) = message_store.query(tenant, &filters, &options).await?;
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
    use crate::message::{now_timestamp, SignaturePayload};
    use crate::store::InMemoryMessageStore;
    use std::collections::{BTreeMap, HashMap};

    async fn resolver_for(tenant: &str, jwk: crate::crypto::Jwk) -> InMemoryDidResolver {
        let resolver = InMemoryDidResolver::new();
        let mut methods = HashMap::new();
        methods.insert("key-1".to_string(), jwk);
        resolver.register(DidDocument { id: tenant.to_string(), verification_methods: methods }).await;
        resolver
    }

    fn query_message(tenant: &str, key: &crate::crypto::secp256k1::SecretKey) -> MessagesQueryMessage {
        let signer = Secp256k1Signer { kid: format!("{tenant}#key-1"), key: key.clone() };
        let descriptor =
            MessagesQueryDescriptor { interface: Interface::Messages, method: Method::Query, message_timestamp: now_timestamp(), filters: Vec::new() };
        let mut message = Message::new(descriptor);
        let cid = message.descriptor_cid().unwrap();
        message.authorize(&signer, SignaturePayload::new(cid), None).unwrap();
        message
    }

    #[tokio::test]
    async fn owner_sees_unpublished_and_published_alike() {
        let tenant = "did:example:alice";
        let key = crate::crypto::secp256k1::SecretKey::generate();
        let resolver = resolver_for(tenant, key.jwk()).await;
        let store = InMemoryMessageStore::new();

        let mut unpublished = BTreeMap::new();
        unpublished.insert("interface".to_string(), IndexValue::Text("Records".to_string()));
        unpublished.insert("published".to_string(), IndexValue::Bool(false));
        store.put(tenant, "cid-1", unpublished, vec![1]).await.unwrap();

        let reply = handle(&store, &resolver, tenant, query_message(tenant, &key)).await;
        assert_eq!(reply.status.code, 200);
        assert_eq!(reply.entries.len(), 1);
    }
}
