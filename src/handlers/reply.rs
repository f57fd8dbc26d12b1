//! The reply shape every handler settles on (spec §4.5/§6):
//! `{status: {code, detail}, ...}`, where the `...` varies by interface —
//! query entries and a pagination cursor, a record's data stream, or a
//! subscription id.
use crate::store::Cursor;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub code: u16,
    pub detail: String,
}

impl Status {
    pub fn new(code: u16, detail: impl Into<String>) -> Self {
        Status { code, detail: detail.into() }
    }
    pub fn ok() -> Self {
        Status::new(200, "ok")
    }
    pub fn accepted() -> Self {
        Status::new(202, "accepted")
    }
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Status::new(400, detail)
    }
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Status::new(401, detail)
    }
    pub fn not_found(detail: impl Into<String>) -> Self {
        Status::new(404, detail)
    }
    pub fn conflict(detail: impl Into<String>) -> Self {
        Status::new(409, detail)
    }
    pub fn internal(detail: impl Into<String>) -> Self {
        Status::new(500, detail)
    }

    pub fn is_success(&self) -> bool {
        self.code < 300
    }
}

/// One stored message surfaced by a query: its CID and the canonically
/// encoded message bytes. Callers decode the bytes into whichever
/// descriptor type their own interface/method expects.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryEntry {
    pub message_cid: String,
    pub message: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct Reply {
    pub status: Status,
    pub entries: Vec<QueryEntry>,
    pub cursor: Option<Cursor>,
    pub data: Option<Vec<u8>>,
    pub subscription_id: Option<u64>,
}

impl Reply {
    pub fn status(status: Status) -> Self {
        Reply { status, entries: Vec::new(), cursor: None, data: None, subscription_id: None }
    }

    pub fn ok() -> Self {
        Self::status(Status::ok())
    }

    pub fn accepted() -> Self {
        Self::status(Status::accepted())
    }

    pub fn ok_with_data(data: Vec<u8>) -> Self {
        let mut reply = Self::ok();
        reply.data = Some(data);
        reply
    }

    pub fn query(entries: Vec<QueryEntry>, cursor: Option<Cursor>) -> Self {
        let mut reply = Self::ok();
        reply.entries = entries;
        reply.cursor = cursor;
        reply
    }

    pub fn subscribed(subscription_id: u64) -> Self {
        let mut reply = Self::ok();
        reply.subscription_id = Some(subscription_id);
        reply
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::status(Status::bad_request(detail))
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::status(Status::unauthorized(detail))
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::status(Status::not_found(detail))
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::status(Status::conflict(detail))
    }
}
