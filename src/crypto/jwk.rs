use serde::{Deserialize, Serialize};

/// A minimal JSON Web Key, carrying only what signature verification needs.
///
/// DID resolution (out of scope per the system spec) is expected to hand
/// back verification methods shaped like this.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// The JOSE `alg` values this crate knows how to verify. DWN messages in the
/// wild are signed with one of these two; adding a curve means adding a
/// variant here and a branch in [`crate::crypto::verify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Es256K,
    EdDsa,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Es256K => "ES256K",
            Algorithm::EdDsa => "EdDSA",
        }
    }
}

impl std::str::FromStr for Algorithm {
    type Err = super::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ES256K" => Ok(Algorithm::Es256K),
            "EdDSA" => Ok(Algorithm::EdDsa),
            other => Err(super::Error::UnsupportedAlgorithm(other.to_string())),
        }
    }
}
