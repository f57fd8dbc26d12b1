//! `EventsGet`: fetches a single accepted message by its own CID, useful
//! for fetching one entry out of an `EventsQuery`/`EventsSubscribe` feed
//! without replaying the whole log (spec §4.3).
use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::message::{validate_timestamp, DescriptorFields, Interface, Message, Method};
use crate::store::{IndexValue, MessageStore};

use super::{error_to_status, Error, QueryEntry, Reply};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsGetDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    pub message_cid: String,
}

impl DescriptorFields for EventsGetDescriptor {
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

pub type EventsGetMessage = Message<EventsGetDescriptor>;

pub async fn handle(
    message_store: &dyn MessageStore,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: EventsGetMessage,
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
    message: EventsGetMessage,
) -> Result<Reply, Error> {
    crate::schema::known::validate("EventsGet", &message.descriptor)?;
    validate_timestamp(&message.descriptor.message_timestamp)?;
    message.verify_authorization(did_resolver).await?;
    let auth = message.authorization.as_ref().expect("verify_authorization checked this");
    let author = auth.author()?;

    let target_cid = &message.descriptor.message_cid;
    let Some(record) = message_store.get(tenant, target_cid).await? else {
        return Ok(Reply::not_found(format!("no message found for {target_cid}")));
    };

    if !crate::auth::is_tenant_shortcut(tenant, &author) {
        let payload = auth.signature_payload()?;
        let grant_id = payload.permission_grant_id.ok_or(crate::auth::Error::NotAuthorized)?;
        let grant =
            crate::auth::grant::check_grant(message_store, tenant, &grant_id, &author, Interface::Events, Method::Get)
                .await?;
        let protocol = match record.indexes.get("protocol") {
            Some(IndexValue::Text(s)) => Some(s.clone()),
            _ => None,
        };
        crate::auth::scope::check_events_query_scope(&grant, &[protocol])?;
    }

    let mut reply = Reply::ok();
    reply.entries = vec![QueryEntry { message_cid: target_cid.clone(), message: record.message }];
    Ok(reply)
}
