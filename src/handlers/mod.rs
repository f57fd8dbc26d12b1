//! Component C5: one state machine per interface/method pair —
//! `PARSE → AUTHENTICATE → AUTHORIZE → CONFLICT-RESOLVE → PERSIST →
//! LOG-EVENT → EMIT → REPLY` (spec §4.5) — plus the `Reply`/`Status`
//! shape they all settle into and the `RecordsMessage` envelope wrapper
//! `RecordsWrite`/`RecordsDelete` share.
//!
//! Each interface/method pair gets its own module and its own concrete
//! descriptor type (spec §9's design note: no God struct of `Option`s),
//! dispatched by name from `crate::node::Dwn` rather than through a
//! runtime `(interface, method)` registry lookup — Rust's descriptor
//! types differ per method, so a single dynamically-typed dispatch table
//! would need to erase that back to `serde_json::Value` at the boundary
//! anyway. `node::Dwn` plays the registry's role, one method per pair.
mod common;
mod error;
mod reply;

pub mod events_get;
pub mod events_query;
pub mod events_subscribe;
pub mod messages_get;
pub mod messages_query;
pub mod messages_subscribe;
pub mod permissions_grant;
pub mod permissions_request;
pub mod permissions_revoke;
pub mod protocols_configure;
pub mod protocols_query;
pub mod records_delete;
pub mod records_query;
pub mod records_read;
pub mod records_subscribe;
pub mod records_write;

pub(crate) use common::{error_to_status, existing_record_entries, is_strictly_newer, newest, RecordEntry};
pub use error::Error;
pub use reply::{QueryEntry, Reply, Status};

use serde::{Deserialize, Serialize};

use crate::message::{Message, SignaturePayload};

/// The envelope `RecordsWrite` and `RecordsDelete` share: a descriptor
/// plus the record's immutable identity. `recordId` is the CID of the
/// *first* write's descriptor (spec §3); it lives beside `descriptor`
/// rather than inside it; a field can't be part of the hash that names
/// it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordsMessage<D> {
    #[serde(rename = "recordId")]
    pub record_id: String,
    #[serde(flatten)]
    pub message: Message<D>,
}

impl<D: Serialize> RecordsMessage<D> {
    pub fn new(record_id: impl Into<String>, descriptor: D) -> Self {
        RecordsMessage { record_id: record_id.into(), message: Message::new(descriptor) }
    }

    pub fn descriptor_cid(&self) -> Result<String, crate::message::Error> {
        self.message.descriptor_cid()
    }

    /// This record message's own identity (spec §3): the CID over
    /// `{descriptor, authorization}`, excluding `recordId` itself (which
    /// names the *first* write's descriptor CID, not this message's own).
    pub fn full_cid(&self) -> Result<String, crate::message::Error> {
        self.message.full_cid()
    }

    pub fn authorize(
        &mut self,
        signer: &dyn crate::crypto::Signer,
        payload: SignaturePayload,
        author_delegated_grant: Option<Box<crate::message::DelegatedGrant>>,
    ) -> Result<(), crate::message::Error> {
        self.message.authorize(signer, payload, author_delegated_grant)
    }
}
