//! `RecordsRead`: fetches the current newest write for a `recordId`
//! along with its data, refusing once that logical key's newest holder is
//! a tombstone (spec §3, §4.5).
use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::message::{decode, validate_timestamp, DescriptorFields, Interface, Message, Method};
use crate::store::{DataStore, IndexValue, MessageStore};

use super::records_write::RecordsWriteMessage;
use super::{error_to_status, existing_record_entries, newest, Error, Reply};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsReadDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    pub record_id: String,
}

impl DescriptorFields for RecordsReadDescriptor {
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

pub type RecordsReadMessage = Message<RecordsReadDescriptor>;

pub async fn handle(
    message_store: &dyn MessageStore,
    data_store: &dyn DataStore,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: RecordsReadMessage,
) -> Reply {
    match run(message_store, data_store, did_resolver, tenant, message).await {
        Ok(reply) => reply,
        Err(err) => Reply::status(error_to_status(&err)),
    }
}

async fn run(
    message_store: &dyn MessageStore,
    data_store: &dyn DataStore,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: RecordsReadMessage,
) -> Result<Reply, Error> {
    crate::schema::known::validate("RecordsRead", &message.descriptor)?;
    validate_timestamp(&message.descriptor.message_timestamp)?;
    message.verify_authorization(did_resolver).await?;
    let auth = message.authorization.as_ref().expect("verify_authorization checked this");
    let author = auth.author()?;

    let record_id = &message.descriptor.record_id;
    let existing = existing_record_entries(message_store, tenant, record_id).await?;
    let Some(current) = newest(&existing) else {
        return Ok(Reply::not_found(format!("no record found for {record_id}")));
    };
    if current.is_delete {
        return Ok(Reply::not_found(format!("record {record_id} has been deleted")));
    }

    let stored = message_store
        .get(tenant, &current.cid)
        .await?
        .ok_or_else(|| Error::RecordNotFound(record_id.clone()))?;
    let write: RecordsWriteMessage = decode(&stored.message)?;
    let descriptor = &write.message.descriptor;

    if !crate::auth::is_tenant_shortcut(tenant, &author) {
        let payload = auth.signature_payload()?;
        let published = descriptor.published.unwrap_or(false);
        let is_recipient = descriptor.recipient.as_deref() == Some(author.as_str());
        if !published && !is_recipient {
            let grant_id = payload.permission_grant_id.ok_or(crate::auth::Error::NotAuthorized)?;
            let grant =
                crate::auth::grant::check_grant(message_store, tenant, &grant_id, &author, Interface::Records, Method::Read)
                    .await?;
            let protocol = descriptor.protocol.clone().ok_or(crate::auth::Error::NotAuthorized)?;
            let scope_request = crate::auth::scope::RecordScopeRequest {
                protocol: protocol.clone(),
                protocol_path: descriptor.protocol_path.clone(),
                context_id: descriptor.context_id.clone(),
                record_id: Some(record_id.clone()),
                schema: descriptor.schema.clone(),
            };
            crate::auth::scope::check_records_scope(&grant, &scope_request)?;

            let record_author = match stored.indexes.get("author") {
                Some(IndexValue::Text(s)) => s.clone(),
                _ => author.clone(),
            };
            let definition = crate::protocol::load_definition(message_store, tenant, &protocol).await?;
            let protocol_path = descriptor.protocol_path.as_deref().unwrap_or_default();
            crate::auth::rules::authorize_action(
                message_store,
                tenant,
                &definition,
                protocol_path,
                "read",
                &author,
                &record_author,
                descriptor.recipient.as_deref(),
                descriptor.parent_id.clone(),
            )
            .await?;
        }
    }

    let data = data_store.get(tenant, record_id, &descriptor.data_cid).await?;
    let mut reply = Reply::ok_with_data(data.unwrap_or_default());
    reply.entries = vec![super::QueryEntry { message_cid: current.cid.clone(), message: stored.message }];
    Ok(reply)
}
