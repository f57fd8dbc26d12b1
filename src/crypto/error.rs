#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("private key uses an unsupported curve: {0}")]
    PrivateKeyUnsupportedCurve(String),
    #[error("unsupported jose algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("malformed key material: {0}")]
    MalformedKey(String),
    #[error(transparent)]
    Base64Decode(#[from] base64::DecodeError),
}
