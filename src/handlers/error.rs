#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Message(#[from] crate::message::Error),
    #[error(transparent)]
    Schema(#[from] crate::schema::Error),
    #[error(transparent)]
    Store(#[from] crate::store::Error),
    #[error(transparent)]
    Auth(#[from] crate::auth::Error),
    #[error(transparent)]
    Protocol(#[from] crate::protocol::Error),
    #[error(transparent)]
    Permission(#[from] crate::permission::Error),
    #[error(transparent)]
    Did(#[from] crate::did::Error),
    #[error("record not found: {0}")]
    RecordNotFound(String),
    #[error("protocol not found: {0}")]
    ProtocolNotFound(String),
    #[error("a newer message for this logical key already exists")]
    Conflict,
    #[error("request does not authenticate: {0}")]
    AuthenticationFailed(String),
}
