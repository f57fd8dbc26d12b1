#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("subscription is closed")]
    SubscriptionClosed,
}
