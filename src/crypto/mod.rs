mod error;
pub mod ed25519;
mod jwk;
pub mod secp256k1;

pub use error::Error;
pub use jwk::{Algorithm, Jwk};

/// Verify `signature` over `payload` against `jwk`, dispatching on `alg`.
///
/// This is the one seam named "out of scope" by the system spec as a
/// pluggable concern; the two branches here are concrete defaults so the
/// rest of the crate (and its tests) have something to run against.
pub fn verify(alg: Algorithm, jwk: &Jwk, payload: &[u8], signature: &[u8]) -> Result<(), Error> {
    match alg {
        Algorithm::Es256K => secp256k1::verify(jwk, payload, signature),
        Algorithm::EdDsa => ed25519::verify(jwk, payload, signature),
    }
}

/// A signer pluggable at message-build time: anything that can produce a
/// JOSE signature and say which `kid`/`alg` it signs under.
pub trait Signer: Send + Sync {
    fn kid(&self) -> String;
    fn algorithm(&self) -> Algorithm;
    fn sign(&self, payload: &[u8]) -> Vec<u8>;
}

pub struct Secp256k1Signer {
    pub kid: String,
    pub key: secp256k1::SecretKey,
}

impl Signer for Secp256k1Signer {
    fn kid(&self) -> String {
        self.kid.clone()
    }
    fn algorithm(&self) -> Algorithm {
        Algorithm::Es256K
    }
    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.key.sign(payload)
    }
}

pub struct Ed25519Signer {
    pub kid: String,
    pub key: ed25519::SecretKey,
}

impl Signer for Ed25519Signer {
    fn kid(&self) -> String {
        self.kid.clone()
    }
    fn algorithm(&self) -> Algorithm {
        Algorithm::EdDsa
    }
    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.key.sign(payload)
    }
}
