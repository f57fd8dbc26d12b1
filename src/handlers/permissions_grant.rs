//! `PermissionsGrant`: the tenant authorizing some other DID to act on
//! its DWN, storing a flat [`PermissionGrant`] keyed by its own
//! descriptor CID so `auth::grant::resolve_grant` can decode it directly
//! (spec §4.4 step 2).
//!
//! Only the tenant itself may grant capability over its own DWN — there
//! is no delegation of the grantor role in this crate.
use serde::{Deserialize, Serialize};

use crate::did::DidResolver;
use crate::events::EventStream;
use crate::message::{encode, now_timestamp, validate_timestamp, DescriptorFields, Interface, Message, Method};
use crate::permission::{Conditions, PermissionGrant, Scope};
use crate::store::{EventLog, IndexValue, MessageStore};

use super::{error_to_status, Error, Reply};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsGrantDescriptor {
    pub interface: Interface,
    pub method: Method,
    pub message_timestamp: String,
    pub grantee: String,
    pub date_granted: String,
    pub date_expires: String,
    pub scope: Scope,
    #[serde(default)]
    pub conditions: Conditions,
}

impl DescriptorFields for PermissionsGrantDescriptor {
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

impl PermissionsGrantDescriptor {
    pub fn new(grantee: impl Into<String>, scope: Scope, date_expires: impl Into<String>) -> Self {
        let timestamp = now_timestamp();
        PermissionsGrantDescriptor {
            interface: Interface::Permissions,
            method: Method::Grant,
            message_timestamp: timestamp.clone(),
            grantee: grantee.into(),
            date_granted: timestamp,
            date_expires: date_expires.into(),
            scope,
            conditions: Conditions::default(),
        }
    }
}

pub type PermissionsGrantMessage = Message<PermissionsGrantDescriptor>;

pub async fn handle(
    message_store: &dyn MessageStore,
    event_log: &dyn EventLog,
    event_stream: &EventStream,
    did_resolver: &dyn DidResolver,
    tenant: &str,
    message: PermissionsGrantMessage,
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
    message: PermissionsGrantMessage,
) -> Result<Reply, Error> {
    // PARSE
    crate::schema::known::validate("PermissionsGrant", &message.descriptor)?;
    validate_timestamp(&message.descriptor.message_timestamp)?;
    validate_timestamp(&message.descriptor.date_granted)?;
    validate_timestamp(&message.descriptor.date_expires)?;

    // AUTHENTICATE
    message.verify_authorization(did_resolver).await?;
    let auth = message.authorization.as_ref().expect("verify_authorization checked this");
    let grantor = auth.author()?;

    // AUTHORIZE: only the tenant itself may issue grants over its own DWN.
    if !crate::auth::is_tenant_shortcut(tenant, &grantor) {
        return Err(crate::auth::Error::NotAuthorized.into());
    }

    // PERSIST
    let descriptor = &message.descriptor;
    let grant_id = message.full_cid()?;
    let grant = PermissionGrant {
        id: grant_id.clone(),
        grantor: grantor.clone(),
        grantee: descriptor.grantee.clone(),
        date_granted: descriptor.date_granted.clone(),
        date_expires: descriptor.date_expires.clone(),
        scope: descriptor.scope.clone(),
        conditions: descriptor.conditions.clone(),
    };

    let mut idx = std::collections::BTreeMap::new();
    idx.insert("interface".to_string(), IndexValue::Text(Interface::Permissions.as_str().to_string()));
    idx.insert("method".to_string(), IndexValue::Text(Method::Grant.as_str().to_string()));
    idx.insert("grantor".to_string(), IndexValue::Text(grantor));
    idx.insert("grantee".to_string(), IndexValue::Text(descriptor.grantee.clone()));
    idx.insert("messageTimestamp".to_string(), IndexValue::Text(descriptor.message_timestamp.clone()));

    let bytes = encode(&grant)?;
    message_store.put(tenant, &grant_id, idx.clone(), bytes).await?;

    // LOG-EVENT
    event_log.append(tenant, &grant_id, idx.clone()).await?;

    // EMIT
    event_stream.emit(tenant, &grant_id, &idx).await;

    Ok(Reply::accepted())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Secp256k1Signer;
    use crate::did::{DidDocument, InMemoryDidResolver};
    use crate::message::{Interface as MsgInterface, Method as MsgMethod, SignaturePayload};
    use crate::store::{InMemoryEventLog, InMemoryMessageStore};
    use std::collections::HashMap;

    async fn resolver_for(tenant: &str, jwk: crate::crypto::Jwk) -> InMemoryDidResolver {
        let resolver = InMemoryDidResolver::new();
        let mut methods = HashMap::new();
        methods.insert("key-1".to_string(), jwk);
        resolver.register(DidDocument { id: tenant.to_string(), verification_methods: methods }).await;
        resolver
    }

    #[tokio::test]
    async fn tenant_grants_a_capability_and_it_resolves_back_out() {
        let tenant = "did:example:alice";
        let key = crate::crypto::secp256k1::SecretKey::generate();
        let resolver = resolver_for(tenant, key.jwk()).await;
        let store = InMemoryMessageStore::new();
        let log = InMemoryEventLog::new();
        let events = EventStream::new();
        let signer = Secp256k1Signer { kid: format!("{tenant}#key-1"), key: key.clone() };

        let scope = Scope { interface: MsgInterface::Records, method: MsgMethod::Write, protocol: None };
        let descriptor = PermissionsGrantDescriptor::new("did:example:bob", scope, "2999-01-01T00:00:00.000000Z");
        let mut message = Message::new(descriptor);
        let cid = message.descriptor_cid().unwrap();
        message.authorize(&signer, SignaturePayload::new(cid), None).unwrap();
        let expected_id = message.full_cid().unwrap();

        let reply = handle(&store, &log, &events, &resolver, tenant, message).await;
        assert_eq!(reply.status.code, 202);

        let resolved = crate::auth::grant::resolve_grant(&store, tenant, &expected_id).await.unwrap();
        assert_eq!(resolved.grantor, tenant);
        assert_eq!(resolved.grantee, "did:example:bob");
    }

    #[tokio::test]
    async fn non_tenant_cannot_issue_a_grant() {
        let tenant = "did:example:alice";
        let bob_key = crate::crypto::secp256k1::SecretKey::generate();
        let resolver = resolver_for("did:example:bob", bob_key.jwk()).await;
        let store = InMemoryMessageStore::new();
        let log = InMemoryEventLog::new();
        let events = EventStream::new();
        let signer = Secp256k1Signer { kid: "did:example:bob#key-1".to_string(), key: bob_key };

        let scope = Scope { interface: MsgInterface::Records, method: MsgMethod::Write, protocol: None };
        let descriptor = PermissionsGrantDescriptor::new("did:example:carol", scope, "2999-01-01T00:00:00.000000Z");
        let mut message = Message::new(descriptor);
        let cid = message.descriptor_cid().unwrap();
        message.authorize(&signer, SignaturePayload::new(cid), None).unwrap();

        let reply = handle(&store, &log, &events, &resolver, tenant, message).await;
        assert_eq!(reply.status.code, 401);
    }
}
