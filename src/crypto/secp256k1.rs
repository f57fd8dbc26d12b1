use super::jwk::Jwk;
use super::Error;

use k256::ecdsa::signature::{Signer as _, Verifier as _};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

pub fn verify(jwk: &Jwk, payload: &[u8], signature: &[u8]) -> Result<(), Error> {
    let x = base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, &jwk.x)?;
    let y = jwk
        .y
        .as_ref()
        .ok_or_else(|| Error::MalformedKey("ES256K jwk missing 'y'".to_string()))?;
    let y = base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, y)?;

    let mut sec1 = Vec::with_capacity(65);
    sec1.push(0x04);
    sec1.extend_from_slice(&x);
    sec1.extend_from_slice(&y);

    let verifying_key = VerifyingKey::from_sec1_bytes(&sec1)
        .map_err(|e| Error::MalformedKey(e.to_string()))?;
    let sig = Signature::from_slice(signature).map_err(|_| Error::SignatureInvalid)?;
    verifying_key
        .verify(payload, &sig)
        .map_err(|_| Error::SignatureInvalid)
}

/// A secp256k1 signer, used by tests and by any caller that wants a concrete
/// `Signer` implementation rather than a pluggable one.
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl SecretKey {
    pub fn generate() -> Self {
        SecretKey(SigningKey::random(&mut rand::thread_rng()))
    }

    pub fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let sig: Signature = self.0.sign(payload);
        sig.to_bytes().to_vec()
    }

    pub fn jwk(&self) -> Jwk {
        let point = self.0.verifying_key().to_encoded_point(false);
        let x = point.x().expect("uncompressed point has x");
        let y = point.y().expect("uncompressed point has y");
        Jwk {
            kty: "EC".to_string(),
            crv: "secp256k1".to_string(),
            x: base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, x),
            y: Some(base64::Engine::encode(
                &base64::engine::general_purpose::URL_SAFE_NO_PAD,
                y,
            )),
        }
    }
}
