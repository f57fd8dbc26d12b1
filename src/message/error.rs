#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("value cannot be canonically encoded: {0}")]
    EncodingUnsupportedValue(String),
    #[error(transparent)]
    Encode(#[from] serde_ipld_dagcbor::EncodeError<std::collections::TryReserveError>),
    #[error(transparent)]
    Decode(#[from] serde_ipld_dagcbor::DecodeError<std::convert::Infallible>),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error("invalid CID: {0}")]
    CidInvalid(String),
    #[error(transparent)]
    Crypto(#[from] crate::crypto::Error),
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("message has no signatures")]
    NoSignatures,
    #[error("timestamp is not a valid microsecond-precision UTC ISO-8601 string: {0}")]
    TimestampInvalid(String),
    #[error("a delegated grant cannot itself carry a delegated grant")]
    CyclicDelegation,
    #[error(transparent)]
    Did(#[from] crate::did::Error),
}
