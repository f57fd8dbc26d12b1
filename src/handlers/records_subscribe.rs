//! `RecordsSubscribe`: the live-delivery counterpart to `RecordsQuery`,
//! sharing its filter grammar and authorization so a client can move
//! from a query to a subscription without learning a second filter
//! shape (spec §4.5, §4.6).
use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::events::{EventStream, Subscription};
use crate::message::{validate_timestamp, DescriptorFields, Interface, Message, Method};
use crate::store::MessageStore;

use super::records_query::{build_filter, RecordsQueryFilter};
use super::{error_to_status, Error, Reply};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsSubscribeDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    #[serde(default)]
    pub filter: RecordsQueryFilter,
}

impl DescriptorFields for RecordsSubscribeDescriptor {
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

pub type RecordsSubscribeMessage = Message<RecordsSubscribeDescriptor>;

pub async fn handle(
    message_store: &dyn MessageStore,
    event_stream: &EventStream,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: RecordsSubscribeMessage,
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
    message: RecordsSubscribeMessage,
) -> Result<(Reply, Subscription), Error> {
    crate::schema::known::validate("RecordsSubscribe", &message.descriptor)?;
    validate_timestamp(&message.descriptor.message_timestamp)?;
    message.verify_authorization(did_resolver).await?;
    let auth = message.authorization.as_ref().expect("verify_authorization checked this");
    let author = auth.author()?;

    let owner = crate::auth::is_tenant_shortcut(tenant, &author);
    if !owner {
        let payload = auth.signature_payload()?;
        if let Some(grant_id) = payload.permission_grant_id {
            let grant = crate::auth::grant::check_grant(
                message_store,
                tenant,
                &grant_id,
                &author,
                Interface::Records,
                Method::Subscribe,
            )
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
            }
        }
    }

    let filter = build_filter(&message.descriptor.filter, owner);
    let subscription = event_stream.subscribe(tenant, vec![filter]).await;
    Ok((Reply::subscribed(subscription.id()), subscription))
}
