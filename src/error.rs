#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Crypto(#[from] crate::crypto::Error),
    #[error(transparent)]
    Message(#[from] crate::message::Error),
    #[error(transparent)]
    Schema(#[from] crate::schema::Error),
    #[error(transparent)]
    Store(#[from] crate::store::Error),
    #[error(transparent)]
    Auth(#[from] crate::auth::Error),
    #[error(transparent)]
    Handler(#[from] crate::handlers::Error),
    #[error(transparent)]
    Did(#[from] crate::did::Error),
    #[error(transparent)]
    Events(#[from] crate::events::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
