//! `ProtocolsQuery`: lists a tenant's installed `ProtocolsConfigure`
//! records, optionally narrowed to one protocol (spec §4.5).
use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::message::{validate_timestamp, DescriptorFields, Interface, Message, Method};
use crate::store::{Filter, FilterValue, IndexValue, MessageStore, QueryOptions};

use super::{error_to_status, Error, QueryEntry, Reply};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolsQueryFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolsQueryDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<ProtocolsQueryFilter>,
}

impl DescriptorFields for ProtocolsQueryDescriptor {
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

pub type ProtocolsQueryMessage = Message<ProtocolsQueryDescriptor>;

pub async fn handle(
    message_store: &dyn MessageStore,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: ProtocolsQueryMessage,
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
    message: ProtocolsQueryMessage,
) -> Result<Reply, Error> {
    crate::schema::known::validate("ProtocolsQuery", &message.descriptor)?;
    validate_timestamp(&message.descriptor.message_timestamp)?;
    message.verify_authorization(did_resolver).await?;
    let auth = message.authorization.as_ref().expect("verify_authorization checked this");
    let author = auth.author()?;

    let requested_protocol = message.descriptor.filter.as_ref().and_then(|f| f.protocol.as_deref());

    let owner = crate::auth::is_tenant_shortcut(tenant, &author);
    if !owner {
        let payload = auth.signature_payload()?;
        let grant_id = payload.permission_grant_id.ok_or(crate::auth::Error::NotAuthorized)?;
        let grant =
            crate::auth::grant::check_grant(message_store, tenant, &grant_id, &author, Interface::Protocols, Method::Query)
                .await?;
        crate::auth::scope::check_protocols_query_scope(&grant, requested_protocol)?;
    }

    let mut filter = Filter::new();
    filter.insert("interface".to_string(), FilterValue::Equal(IndexValue::Text(Interface::Protocols.as_str().to_string())));
    filter.insert("method".to_string(), FilterValue::Equal(IndexValue::Text(Method::Configure.as_str().to_string())));
    if let Some(protocol) = requested_protocol {
        filter.insert("protocol".to_string(), FilterValue::Equal(IndexValue::Text(protocol.to_string())));
    }
    // A grant scoped to this protocol (checked above) unlocks its
    // unpublished configuration too, same as the tenant's own view.
    if !owner && requested_protocol.is_none() {
        filter.insert("published".to_string(), FilterValue::Equal(IndexValue::Bool(true)));
    }

    let (results, cursor) = message_store.query(tenant, &vec![filter], &QueryOptions::default()).await?;
    let entries = results
        .into_iter()
        .map(|record| QueryEntry { message_cid: record.cid, message: record.message })
        .collect();
    Ok(Reply::query(entries, cursor))
}
