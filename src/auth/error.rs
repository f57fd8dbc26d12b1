#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("author is not authorized for this operation")]
    NotAuthorized,
    #[error("protocol rule denied for {0:?}")]
    ProtocolRuleDenied(String),
    #[error(transparent)]
    Permission(#[from] crate::permission::Error),
    #[error(transparent)]
    Protocol(#[from] crate::protocol::Error),
    #[error(transparent)]
    Store(#[from] crate::store::Error),
    #[error(transparent)]
    Message(#[from] crate::message::Error),
}
