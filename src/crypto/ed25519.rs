use super::jwk::Jwk;
use super::Error;

use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey, Signature};

pub fn verify(jwk: &Jwk, payload: &[u8], signature: &[u8]) -> Result<(), Error> {
    let x = base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, &jwk.x)?;
    let x: [u8; 32] = x
        .try_into()
        .map_err(|_| Error::MalformedKey("EdDSA jwk 'x' must be 32 bytes".to_string()))?;
    let verifying_key =
        VerifyingKey::from_bytes(&x).map_err(|e| Error::MalformedKey(e.to_string()))?;
    let sig_bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| Error::SignatureInvalid)?;
    let sig = Signature::from_bytes(&sig_bytes);
    verifying_key
        .verify(payload, &sig)
        .map_err(|_| Error::SignatureInvalid)
}

#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl SecretKey {
    pub fn generate() -> Self {
        SecretKey(SigningKey::generate(&mut rand::thread_rng()))
    }

    pub fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.0.sign(payload).to_bytes().to_vec()
    }

    pub fn jwk(&self) -> Jwk {
        Jwk {
            kty: "OKP".to_string(),
            crv: "Ed25519".to_string(),
            x: base64::Engine::encode(
                &base64::engine::general_purpose::URL_SAFE_NO_PAD,
                self.0.verifying_key().as_bytes(),
            ),
            y: None,
        }
    }
}
