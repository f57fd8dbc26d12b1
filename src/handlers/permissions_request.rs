//! `PermissionsRequest`: any authenticated DID may ask a tenant for a
//! capability, same as real-world DWN behavior where requesting a grant
//! doesn't itself require being pre-authorized. The tenant reviews the
//! stored request out-of-band and answers with a `PermissionsGrant`
//! (spec §4.4).
use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::events::EventStream;
use crate::message::{encode, validate_timestamp, DescriptorFields, Interface, Message, Method};
use crate::permission::{Conditions, Scope};
use crate::store::{EventLog, IndexValue, MessageStore};

use super::{error_to_status, Error, Reply};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsRequestDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    pub scope: Scope,
    #[serde(default)]
    pub conditions: Conditions,
}

impl DescriptorFields for PermissionsRequestDescriptor {
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

impl PermissionsRequestDescriptor {
    pub fn new(scope: Scope, message_timestamp: impl Into<String>) -> Self {
        PermissionsRequestDescriptor {
            interface: Interface::Permissions,
            method: Method::Request,
            message_timestamp: message_timestamp.into(),
            scope,
            conditions: Conditions::default(),
        }
    }
}

pub type PermissionsRequestMessage = Message<PermissionsRequestDescriptor>;

pub async fn handle(
    message_store: &dyn MessageStore,
    event_log: &dyn EventLog,
    event_stream: &EventStream,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: PermissionsRequestMessage,
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
    message: PermissionsRequestMessage,
) -> Result<Reply, Error> {
    // PARSE
    crate::schema::known::validate("PermissionsRequest", &message.descriptor)?;
    validate_timestamp(&message.descriptor.message_timestamp)?;

    // AUTHENTICATE (no further authorization step: any signed DID may ask)
    message.verify_authorization(did_resolver).await?;
    let auth = message.authorization.as_ref().expect("verify_authorization checked this");
    let author = auth.author()?;

    // PERSIST
    let incoming_cid = message.full_cid()?;
    let mut idx = std::collections::BTreeMap::new();
    idx.insert("interface".to_string(), IndexValue::Text(Interface::Permissions.as_str().to_string()));
    idx.insert("method".to_string(), IndexValue::Text(Method::Request.as_str().to_string()));
    idx.insert("author".to_string(), IndexValue::Text(author));
    idx.insert("messageTimestamp".to_string(), IndexValue::Text(message.descriptor.message_timestamp.clone()));

    let bytes = encode(&message)?;
    message_store.put(tenant, &incoming_cid, idx.clone(), bytes).await?;

    // LOG-EVENT
    event_log.append(tenant, &incoming_cid, idx.clone()).await?;

    // EMIT
    event_stream.emit(tenant, &incoming_cid, &idx).await;

    Ok(Reply::accepted())
}
