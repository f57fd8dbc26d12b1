//! General JWS construction and verification (spec §6), shaped exactly as
//! the teacher's broken draft `dwn/jws-types.rs` names it: a detached
//! payload plus a list of `{protected, signature}` entries, all three
//! segments base64url (no padding) encoded.
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::crypto::{self, Algorithm, Signer};
use crate::did::DidResolver;

use super::Error;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureEntry {
    pub protected: String,
    pub signature: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneralJws {
    pub payload: String,
    pub signatures: Vec<SignatureEntry>,
}

#[derive(Serialize, Deserialize)]
struct ProtectedHeader {
    alg: String,
    kid: String,
}

impl GeneralJws {
    /// Build a detached-payload JWS, signing `payload` once per signer.
    pub fn build(payload: &[u8], signers: &[&dyn Signer]) -> Result<Self, Error> {
        if signers.is_empty() {
            return Err(Error::NoSignatures);
        }
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
        let mut signatures = Vec::with_capacity(signers.len());
        for signer in signers {
            let header = ProtectedHeader { alg: signer.algorithm().as_str().to_string(), kid: signer.kid() };
            let protected_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
            let signing_input = format!("{protected_b64}.{payload_b64}");
            let signature = URL_SAFE_NO_PAD.encode(signer.sign(signing_input.as_bytes()));
            signatures.push(SignatureEntry { protected: protected_b64, signature });
        }
        Ok(GeneralJws { payload: payload_b64, signatures })
    }

    /// The DID of the first signature's `kid`, with its fragment dropped.
    /// Per spec §4.1 this is the message's `signer`.
    pub fn signer(&self) -> Result<String, Error> {
        let entry = self.signatures.first().ok_or(Error::NoSignatures)?;
        let header = decode_header(entry)?;
        let (did, _fragment) = crate::did::split_kid(&header.kid)?;
        Ok(did)
    }

    /// Verify every signature entry against the resolved signer key.
    /// Returns `Ok(())` only if every entry verifies.
    pub async fn verify(&self, resolver: &dyn DidResolver) -> Result<(), Error> {
        for entry in &self.signatures {
            let header = decode_header(entry)?;
            let alg: Algorithm = header
                .alg
                .parse()
                .map_err(|e: crate::crypto::Error| Error::Crypto(e))?;
            let jwk = resolver.resolve_key(&header.kid).await?;
            let signing_input = format!("{}.{}", entry.protected, self.payload);
            let signature = URL_SAFE_NO_PAD
                .decode(&entry.signature)
                .map_err(|e| Error::Crypto(crate::crypto::Error::Base64Decode(e)))?;
            crypto::verify(alg, &jwk, signing_input.as_bytes(), &signature)
                .map_err(|_| Error::SignatureInvalid)?;
        }
        Ok(())
    }

    pub fn payload_bytes(&self) -> Result<Vec<u8>, Error> {
        URL_SAFE_NO_PAD
            .decode(&self.payload)
            .map_err(|e| Error::Crypto(crate::crypto::Error::Base64Decode(e)))
    }
}

fn decode_header(entry: &SignatureEntry) -> Result<ProtectedHeader, Error> {
    let bytes = URL_SAFE_NO_PAD
        .decode(&entry.protected)
        .map_err(|e| Error::Crypto(crate::crypto::Error::Base64Decode(e)))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Secp256k1Signer;
    use crate::did::{DidDocument, InMemoryDidResolver};
    use std::collections::HashMap;

    #[tokio::test]
    async fn build_and_verify_round_trip() {
        let key = crate::crypto::secp256k1::SecretKey::generate();
        let signer = Secp256k1Signer { kid: "did:example:alice#key-1".to_string(), key: key.clone() };
        let jws = GeneralJws::build(b"hello world", &[&signer]).unwrap();

        let resolver = InMemoryDidResolver::new();
        let mut methods = HashMap::new();
        methods.insert("key-1".to_string(), key.jwk());
        resolver
            .register(DidDocument { id: "did:example:alice".to_string(), verification_methods: methods })
            .await;

        assert!(jws.verify(&resolver).await.is_ok());
        assert_eq!(jws.signer().unwrap(), "did:example:alice");
        assert_eq!(jws.payload_bytes().unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn tampered_signature_fails_verification() {
        let key = crate::crypto::secp256k1::SecretKey::generate();
        let signer = Secp256k1Signer { kid: "did:example:alice#key-1".to_string(), key: key.clone() };
        let mut jws = GeneralJws::build(b"hello world", &[&signer]).unwrap();
        jws.payload = URL_SAFE_NO_PAD.encode(b"tampered");

        let resolver = InMemoryDidResolver::new();
        let mut methods = HashMap::new();
        methods.insert("key-1".to_string(), key.jwk());
        resolver
            .register(DidDocument { id: "did:example:alice".to_string(), verification_methods: methods })
            .await;

        assert!(jws.verify(&resolver).await.is_err());
    }

    #[test]
    fn build_requires_at_least_one_signer() {
        assert!(GeneralJws::build(b"payload", &[]).is_err());
    }
}
