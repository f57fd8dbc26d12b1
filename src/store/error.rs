#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("a range filter cannot set both gt and gte, or both lt and lte")]
    RangeFilterMutuallyExclusive,
    #[error("cursor does not match the requested sort property")]
    CursorMismatch,
    #[error("data not found for CID: {0}")]
    DataNotFound(String),
    #[error("store operation aborted: {0}")]
    StoreAborted(String),
}
