//! `MessagesSubscribe`: the `MessagesQuery` counterpart for live
//! delivery, registered against the same broker `RecordsSubscribe` and
//! `EventsSubscribe` use (spec §4.3, §4.6).
use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::events::{EventStream, Subscription};
use crate::message::{validate_timestamp, DescriptorFields, Interface, Message, Method};
use crate::store::MessageStore;

use super::messages_query::{build_filters, MessagesQueryFilter};
use super::{error_to_status, Error, Reply};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesSubscribeDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    #[serde(default)]
    pub filters: Vec<MessagesQueryFilter>,
}

impl DescriptorFields for MessagesSubscribeDescriptor {
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

pub type MessagesSubscribeMessage = Message<MessagesSubscribeDescriptor>;

pub async fn handle(
    message_store: &dyn MessageStore,
    event_stream: &EventStream,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: MessagesSubscribeMessage,
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
    message: MessagesSubscribeMessage,
) -> Result<(Reply, Subscription), Error> {
    crate::schema::known::validate("MessagesSubscribe", &message.descriptor)?;
    validate_timestamp(&message.descriptor.message_timestamp)?;
    message.verify_authorization(did_resolver).await?;
    let auth = message.authorization.as_ref().expect("verify_authorization checked this");
    let author = auth.author()?;

    if !crate::auth::is_tenant_shortcut(tenant, &author) {
        let payload = auth.signature_payload()?;
        let grant_id = payload.permission_grant_id.ok_or(crate::auth::Error::NotAuthorized)?;
        let grant = crate::auth::grant::check_grant(
            message_store,
            tenant,
            &grant_id,
            &author,
            Interface::Messages,
            Method::Subscribe,
        )
        .await?;
        let protocols: Vec<Option<String>> = message.descriptor.filters.iter().map(|f| f.protocol.clone()).collect();
        if protocols.iter().any(Option::is_some) {
            crate::auth::scope::check_events_query_scope(&grant, &protocols)?;
        }
    }

    let filters = build_filters(&message.descriptor.filters);
    let subscription = event_stream.subscribe(tenant, filters).await;
    Ok((Reply::subscribed(subscription.id()), subscription))
}
