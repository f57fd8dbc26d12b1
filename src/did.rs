//! DID resolution is treated as an external collaborator by the system spec
//! (§1): this module defines only the callable shape the rest of the crate
//! needs — `resolve(did) -> DidDocument` providing verification methods
//! keyed by `kid` — plus an in-memory resolver for tests and small
//! deployments. Concrete DID methods (did:web, did:dht, ...) are not
//! implemented here, mirroring the teacher's `DidResolver` trait in
//! `dids/traits.rs`, which is likewise implemented by pluggable method
//! structs rather than by the trait itself.
use std::collections::HashMap;
use std::sync::Arc;

use dyn_clone::{clone_trait_object, DynClone};
use tokio::sync::RwLock;

use crate::crypto::Jwk;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("DID not found: {0}")]
    NotFound(String),
    #[error("verification method not found: {0}")]
    KeyNotFound(String),
    #[error("malformed DID URL: {0}")]
    MalformedDidUrl(String),
}

/// A resolved DID document, reduced to what authentication needs: a lookup
/// from verification-method id (the fragment of a `kid`) to its JWK.
#[derive(Clone, Debug, Default)]
pub struct DidDocument {
    pub id: String,
    pub verification_methods: HashMap<String, Jwk>,
}

impl DidDocument {
    pub fn get_key(&self, fragment: &str) -> Option<&Jwk> {
        self.verification_methods.get(fragment)
    }
}

/// Splits a fully-qualified DID URL (`did:example:123#key-1`) into the DID
/// and the verification-method fragment.
pub fn split_kid(kid: &str) -> Result<(String, String), Error> {
    let (did, fragment) = kid
        .split_once('#')
        .ok_or_else(|| Error::MalformedDidUrl(kid.to_string()))?;
    Ok((did.to_string(), fragment.to_string()))
}

#[async_trait::async_trait]
pub trait DidResolver: DynClone + std::fmt::Debug + Sync + Send {
    async fn resolve(&self, did: &str) -> Result<Option<DidDocument>, Error>;

    /// Resolve the JWK a fully-qualified `kid` (DID URL) names.
    async fn resolve_key(&self, kid: &str) -> Result<Jwk, Error> {
        let (did, fragment) = split_kid(kid)?;
        let doc = self
            .resolve(&did)
            .await?
            .ok_or_else(|| Error::NotFound(did.clone()))?;
        doc.get_key(&fragment)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(kid.to_string()))
    }
}
clone_trait_object!(DidResolver);

/// A resolver backed by an in-process map, for tests and single-node setups
/// where every tenant's document is registered up front.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDidResolver {
    documents: Arc<RwLock<HashMap<String, DidDocument>>>,
}

impl InMemoryDidResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, document: DidDocument) {
        self.documents.write().await.insert(document.id.clone(), document);
    }
}

#[async_trait::async_trait]
impl DidResolver for InMemoryDidResolver {
    async fn resolve(&self, did: &str) -> Result<Option<DidDocument>, Error> {
        Ok(self.documents.read().await.get(did).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_registered_key() {
        let resolver = InMemoryDidResolver::new();
        let jwk = crate::crypto::secp256k1::SecretKey::generate().jwk();
        let mut methods = HashMap::new();
        methods.insert("key-1".to_string(), jwk.clone());
        resolver
            .register(DidDocument { id: "did:example:alice".to_string(), verification_methods: methods })
            .await;

        let resolved = resolver.resolve_key("did:example:alice#key-1").await.unwrap();
        assert_eq!(resolved, jwk);
    }

    #[tokio::test]
    async fn missing_did_errors() {
        let resolver = InMemoryDidResolver::new();
        assert!(resolver.resolve_key("did:example:bob#key-1").await.is_err());
    }
}
