//! `MessagesGet`: fetches one raw message by CID, the `MessagesQuery`
//! counterpart to `EventsGet` (spec §4.3).
use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::message::{validate_timestamp, DescriptorFields, Interface, Message, Method};
use crate::store::{IndexValue, MessageStore};

use super::{error_to_status, Error, QueryEntry, Reply};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesGetDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    pub message_cid: String,
}

impl DescriptorFields for MessagesGetDescriptor {
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

pub type MessagesGetMessage = Message<MessagesGetDescriptor>;

pub async fn handle(
    message_store: &dyn MessageStore,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: MessagesGetMessage,
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
    message: MessagesGetMessage,
) -> Result<Reply, Error> {
    crate::schema::known::validate("MessagesGet", &message.descriptor)?;
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
            crate::auth::grant::check_grant(message_store, tenant, &grant_id, &author, Interface::Messages, Method::Get)
                .await?;
        if let Some(IndexValue::Text(protocol)) = record.indexes.get("protocol") {
            crate::auth::scope::check_events_query_scope(&grant, &[Some(protocol.clone())])?;
        }
    }

    let mut reply = Reply::ok();
    reply.entries = vec![QueryEntry { message_cid: target_cid.clone(), message: record.message }];
    Ok(reply)
}
