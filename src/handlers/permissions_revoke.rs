//! `PermissionsRevoke`: only the original grantor can revoke a grant
//! they issued. Stored as the full signed envelope, indexed under
//! `revokedGrantId` so `auth::grant::is_revoked` picks it up unchanged
//! (spec §4.4 step 2).
use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::events::EventStream;
use crate::message::{encode, validate_timestamp, DescriptorFields, Interface, Message, Method};
use crate::store::{EventLog, IndexValue, MessageStore};

use super::{error_to_status, Error, Reply};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsRevokeDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    pub permission_grant_id: String,
}

impl DescriptorFields for PermissionsRevokeDescriptor {
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

impl PermissionsRevokeDescriptor {
    pub fn new(permission_grant_id: impl Into<String>, message_timestamp: impl Into<String>) -> Self {
        PermissionsRevokeDescriptor {
            interface: Interface::Permissions,
            method: Method::Revoke,
            message_timestamp: message_timestamp.into(),
            permission_grant_id: permission_grant_id.into(),
        }
    }
}

pub type PermissionsRevokeMessage = Message<PermissionsRevokeDescriptor>;

pub async fn handle(
    message_store: &dyn MessageStore,
    event_log: &dyn EventLog,
    event_stream: &EventStream,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: PermissionsRevokeMessage,
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
    message: PermissionsRevokeMessage,
) -> Result<Reply, Error> {
    // PARSE
    crate::schema::known::validate("PermissionsRevoke", &message.descriptor)?;
    validate_timestamp(&message.descriptor.message_timestamp)?;

    // AUTHENTICATE
    message.verify_authorization(did_resolver).await?;
    let auth = message.authorization.as_ref().expect("verify_authorization checked this");
    let author = auth.author()?;

    // AUTHORIZE: only the original grantor may revoke a grant.
    let grant_id = &message.descriptor.permission_grant_id;
    let grant = crate::auth::grant::resolve_grant(message_store, tenant, grant_id).await?;
    if grant.grantor != author {
        return Err(crate::auth::Error::NotAuthorized.into());
    }

    // PERSIST
    let incoming_cid = message.full_cid()?;
    let mut idx = std::collections::BTreeMap::new();
    idx.insert("interface".to_string(), IndexValue::Text(Interface::Permissions.as_str().to_string()));
    idx.insert("method".to_string(), IndexValue::Text(Method::Revoke.as_str().to_string()));
    idx.insert("author".to_string(), IndexValue::Text(author));
    idx.insert(crate::auth::grant::REVOKED_GRANT_ID_INDEX.to_string(), IndexValue::Text(grant_id.clone()));
    idx.insert("messageTimestamp".to_string(), IndexValue::Text(message.descriptor.message_timestamp.clone()));

    let bytes = encode(&message)?;
    message_store.put(tenant, &incoming_cid, idx.clone(), bytes).await?;

    // LOG-EVENT
    event_log.append(tenant, &incoming_cid, idx.clone()).await?;

    // EMIT
    event_stream.emit(tenant, &incoming_cid, &idx).await;

    Ok(Reply::accepted())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Secp256k1Signer;
    use crate::did::{DidDocument, InMemoryDidResolver};
    use crate::message::{now_timestamp, SignaturePayload};
    use crate::permission::{Conditions, PermissionGrant, Scope};
    use crate::store::{InMemoryEventLog, InMemoryMessageStore};
    use std::collections::HashMap;

    async fn resolver_for(tenant: &str, jwk: crate::crypto::Jwk) -> InMemoryDidResolver {
        let resolver = InMemoryDidResolver::new();
        let mut methods = HashMap::new();
        methods.insert("key-1".to_string(), jwk);
        resolver.register(DidDocument { id: tenant.to_string(), verification_methods: methods }).await;
        resolver
    }

    async fn store_grant(store: &InMemoryMessageStore, tenant: &str, grantor: &str) -> String {
        let grant = PermissionGrant {
            id: "grant-1".to_string(),
            grantor: grantor.to_string(),
            grantee: "did:example:bob".to_string(),
            date_granted: "2024-01-01T00:00:00.000000Z".to_string(),
            date_expires: "2999-01-01T00:00:00.000000Z".to_string(),
            scope: Scope { interface: Interface::Records, method: Method::Write, protocol: None },
            conditions: Conditions::default(),
        };
        let bytes = encode(&grant).unwrap();
        store.put(tenant, "grant-1", std::collections::BTreeMap::new(), bytes).await.unwrap();
        "grant-1".to_string()
    }

    #[tokio::test]
    async fn grantor_revokes_their_own_grant() {
        let tenant = "did:example:alice";
        let key = crate::crypto::secp256k1::SecretKey::generate();
        let resolver = resolver_for(tenant, key.jwk()).await;
        let store = InMemoryMessageStore::new();
        let log = InMemoryEventLog::new();
        let events = EventStream::new();
        let signer = Secp256k1Signer { kid: format!("{tenant}#key-1"), key: key.clone() };

        let grant_id = store_grant(&store, tenant, tenant).await;

        let descriptor = PermissionsRevokeDescriptor::new(grant_id.clone(), now_timestamp());
        let mut message = Message::new(descriptor);
        let cid = message.descriptor_cid().unwrap();
        message.authorize(&signer, SignaturePayload::new(cid), None).unwrap();

        let reply = handle(&store, &log, &events, &resolver, tenant, message).await;
        assert_eq!(reply.status.code, 202);

        assert!(crate::auth::grant::is_revoked(&store, tenant, &grant_id).await.unwrap());
    }

    #[tokio::test]
    async fn non_grantor_cannot_revoke() {
        let tenant = "did:example:alice";
        let carol_key = crate::crypto::secp256k1::SecretKey::generate();
        let resolver = resolver_for("did:example:carol", carol_key.jwk()).await;
        let store = InMemoryMessageStore::new();
        let log = InMemoryEventLog::new();
        let events = EventStream::new();
        let signer = Secp256k1Signer { kid: "did:example:carol#key-1".to_string(), key: carol_key };

        let grant_id = store_grant(&store, tenant, tenant).await;

        let descriptor = PermissionsRevokeDescriptor::new(grant_id, now_timestamp());
        let mut message = Message::new(descriptor);
        let cid = message.descriptor_cid().unwrap();
        message.authorize(&signer, SignaturePayload::new(cid), None).unwrap();

        let reply = handle(&store, &log, &events, &resolver, tenant, message).await;
        assert_eq!(reply.status.code, 401);
    }
}
