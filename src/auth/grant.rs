//! Grant resolution: step 2 of the authorization sequence (spec §4.4) —
//! load the `PermissionGrant` a message claims to act under and confirm
//! it actually covers this author and operation.
use crate::message::{Interface, Method};
use crate::permission::PermissionGrant;
use crate::store::{Filter, FilterValue, IndexValue, MessageStore, QueryOptions};

use super::Error;

/// The index key under which a `PermissionsRevoke` message is stored,
/// naming the grant it revokes.
pub const REVOKED_GRANT_ID_INDEX: &str = "revokedGrantId";

/// `PermissionsGrant` records are stored keyed by their own record CID;
/// `permissionGrantId` in a signature payload names that same CID.
pub async fn resolve_grant(
    message_store: &dyn MessageStore,
    tenant: &str,
    permission_grant_id: &str,
) -> Result<PermissionGrant, Error> {
    let record = message_store.get(tenant, permission_grant_id).await?;
    let record = record.ok_or_else(|| crate::permission::Error::GrantNotFound(permission_grant_id.to_string()))?;
    crate::message::decode(&record.message)
        .map_err(|_| crate::permission::Error::GrantNotFound(permission_grant_id.to_string()).into())
}

pub async fn is_revoked(message_store: &dyn MessageStore, tenant: &str, grant_id: &str) -> Result<bool, Error> {
    let mut filter = Filter::new();
    filter.insert(REVOKED_GRANT_ID_INDEX.to_string(), FilterValue::Equal(IndexValue::Text(grant_id.to_string())));
    let (results, _) = message_store.query(tenant, &vec![filter], &QueryOptions::default()).await?;
    Ok(!results.is_empty())
}

/// Steps 2 and (scope narrowing of) step 3 combined: resolve the grant
/// and walk the checks in the spec's mandated order — grantor, grantee,
/// expiry, revocation, then interface/method scope.
pub async fn check_grant(
    message_store: &dyn MessageStore,
    tenant: &str,
    permission_grant_id: &str,
    author: &str,
    interface: Interface,
    method: Method,
) -> Result<PermissionGrant, Error> {
    let grant = resolve_grant(message_store, tenant, permission_grant_id).await?;
    if grant.grantor != tenant {
        return Err(crate::permission::Error::GrantNotGranted(grant.id.clone()).into());
    }
    grant.authorizes_author(author)?;
    if is_revoked(message_store, tenant, &grant.id).await? {
        return Err(crate::permission::Error::GrantRevoked(grant.id.clone()).into());
    }
    grant.authorizes_operation(interface, method)?;
    Ok(grant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::{Conditions, Scope};
    use crate::store::InMemoryMessageStore;
    use std::collections::BTreeMap;

    fn sample_grant(id: &str) -> PermissionGrant {
        PermissionGrant {
            id: id.to_string(),
            grantor: "did:example:alice".to_string(),
            grantee: "did:example:bob".to_string(),
            date_granted: "2024-01-01T00:00:00.000000Z".to_string(),
            date_expires: "2999-01-01T00:00:00.000000Z".to_string(),
            scope: Scope { interface: Interface::Records, method: Method::Write, protocol: None },
            conditions: Conditions::default(),
        }
    }

    #[tokio::test]
    async fn resolves_a_stored_grant() {
        let store = InMemoryMessageStore::new();
        let grant = sample_grant("grant-1");
        let bytes = crate::message::encode(&grant).unwrap();
        store.put("did:example:alice", "grant-1", BTreeMap::new(), bytes).await.unwrap();

        let resolved = resolve_grant(&store, "did:example:alice", "grant-1").await.unwrap();
        assert_eq!(resolved.id, "grant-1");
    }

    #[tokio::test]
    async fn missing_grant_errors() {
        let store = InMemoryMessageStore::new();
        assert!(resolve_grant(&store, "did:example:alice", "missing").await.is_err());
    }

    #[tokio::test]
    async fn revoked_grant_is_detected() {
        let store = InMemoryMessageStore::new();
        let mut indexes = BTreeMap::new();
        indexes.insert(REVOKED_GRANT_ID_INDEX.to_string(), IndexValue::Text("grant-1".to_string()));
        store.put("did:example:alice", "revoke-1", indexes, vec![]).await.unwrap();
        assert!(is_revoked(&store, "did:example:alice", "grant-1").await.unwrap());
        assert!(!is_revoked(&store, "did:example:alice", "grant-2").await.unwrap());
    }

    #[tokio::test]
    async fn check_grant_rejects_a_grant_issued_by_a_different_tenant() {
        let store = InMemoryMessageStore::new();
        let grant = sample_grant("grant-1");
        let bytes = crate::message::encode(&grant).unwrap();
        store.put("did:example:carol", "grant-1", BTreeMap::new(), bytes).await.unwrap();

        let result =
            check_grant(&store, "did:example:carol", "grant-1", "did:example:bob", Interface::Records, Method::Write).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn check_grant_rejects_wrong_method() {
        let store = InMemoryMessageStore::new();
        let grant = sample_grant("grant-1");
        let bytes = crate::message::encode(&grant).unwrap();
        store.put("did:example:alice", "grant-1", BTreeMap::new(), bytes).await.unwrap();

        let result = check_grant(
            &store,
            "did:example:alice",
            "grant-1",
            "did:example:bob",
            Interface::Records,
            Method::Delete,
        )
        .await;
        assert!(result.is_err());
    }
}
