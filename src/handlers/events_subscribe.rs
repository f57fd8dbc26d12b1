//! `EventsSubscribe`: registers a live listener against the broker for
//! the same filter grammar `EventsQuery` replays from the durable log
//! (spec §4.3, §4.6). Past events are not replayed; pair with an
//! `EventsQuery` against a cursor taken before subscribing to avoid a
//! gap.
use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::events::{EventStream, Subscription};
use crate::message::{validate_timestamp, DescriptorFields, Interface, Message, Method};
use crate::store::MessageStore;

use super::events_query::{build_filters, EventsFilter};
use super::{error_to_status, Error, Reply};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsSubscribeDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    #[serde(default)]
    pub filters: Vec<EventsFilter>,
}

impl DescriptorFields for EventsSubscribeDescriptor {
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

pub type EventsSubscribeMessage = Message<EventsSubscribeDescriptor>;

pub async fn handle(
    message_store: &dyn MessageStore,
    event_stream: &EventStream,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: EventsSubscribeMessage,
) -> (Reply, Option<Subscription>) {
    match run(message_store, event_stream, did_resolver, tenant, message).await {
        Ok((reply, subscription)) => (reply, Some(subscription)),
        Err(err) => (Reply::status(error_to_status(&err)), None),
    }
}

async fn run(
    message_store: &dyn MessageStore,
    event_stream: &EventStream,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: EventsSubscribeMessage,
) -> Result<(Reply, Subscription), Error> {
    crate::schema::known::validate("EventsSubscribe", &message.descriptor)?;
    validate_timestamp(&message.descriptor.message_timestamp)?;
    message.verify_authorization(did_resolver).await?;
    let auth = message.authorization.as_ref().expect("verify_authorization checked this");
    let author = auth.author()?;

    if !crate::auth::is_tenant_shortcut(tenant, &author) {
        let payload = auth.signature_payload()?;
        let grant_id = payload.permission_grant_id.ok_or(crate::auth::Error::NotAuthorized)?;
        let grant =
            crate::auth::grant::check_grant(message_store, tenant, &grant_id, &author, Interface::Events, Method::Subscribe)
                .await?;
        if message.descriptor.filters.is_empty() {
            return Err(crate::auth::Error::NotAuthorized.into());
        }
        let protocols: Vec<Option<String>> = message.descriptor.filters.iter().map(|f| f.protocol.clone()).collect();
        crate::auth::scope::check_events_query_scope(&grant, &protocols)?;
    }

    let filters = build_filters(&message.descriptor.filters);
    let subscription = event_stream.subscribe(tenant, filters).await;
    Ok((Reply::subscribed(subscription.id()), subscription))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Secp256k1Signer;
    use crate::did::{DidDocument, InMemoryDidResolver};
    use crate::message::{now_timestamp, SignaturePayload};
    use crate::store::{IndexValue, InMemoryMessageStore};
    use std::collections::{BTreeMap, HashMap};

    async fn resolver_for(tenant: &str, jwk: crate::crypto::Jwk) -> InMemoryDidResolver {
        let resolver = InMemoryDidResolver::new();
        let mut methods = HashMap::new();
        methods.insert("key-1".to_string(), jwk);
        resolver.register(DidDocument { id: tenant.to_string(), verification_methods: methods }).await;
        resolver
    }

    fn subscribe_message(tenant: &str, key: &crate::crypto::secp256k1::SecretKey) -> EventsSubscribeMessage {
        let signer = Secp256k1Signer { kid: format!("{tenant}#key-1"), key: key.clone() };
        let descriptor =
            EventsSubscribeDescriptor { interface: Interface::Events, method: Method::Subscribe, message_timestamp: now_timestamp(), filters: Vec::new() };
        let mut message = Message::new(descriptor);
        let cid = message.descriptor_cid().unwrap();
        message.authorize(&signer, SignaturePayload::new(cid), None).unwrap();
        message
    }

    #[tokio::test]
    async fn owner_receives_subsequently_emitted_events() {
        let tenant = "did:example:alice";
        let key = crate::crypto::secp256k1::SecretKey::generate();
        let resolver = resolver_for(tenant, key.jwk()).await;
        let store = InMemoryMessageStore::new();
        let event_stream = EventStream::new();

        let (reply, subscription) = handle(&store, &event_stream, &resolver, tenant, subscribe_message(tenant, &key)).await;
        assert_eq!(reply.status.code, 200);
        let mut subscription = subscription.expect("a subscription must be returned on success");

        event_stream.emit(tenant, "cid-1", &BTreeMap::from([("schema".to_string(), IndexValue::Text("s1".to_string()))])).await;
        let event = subscription.recv().await.unwrap();
        assert_eq!(event.message_cid, "cid-1");
    }
}
