//! Shared plumbing every interface handler's state machine leans on: the
//! error→status mapping spec §7's propagation policy spells out, and the
//! newest-wins comparison spec §3 defines once and every conflict-resolve
//! step reuses.
use crate::message::cmp_timestamps;
use crate::store::{Filter, FilterValue, IndexValue, MessageStore, QueryOptions};

use super::{Error, Status};

/// One prior write or delete sharing a record's logical key (`recordId`),
/// reduced to what `RecordsWrite`/`RecordsDelete`'s CONFLICT-RESOLVE step
/// needs: its own CID, its `messageTimestamp`, and whether it was itself a
/// tombstone.
#[derive(Clone, Debug)]
pub struct RecordEntry {
    pub cid: String,
    pub timestamp: String,
    pub is_delete: bool,
}

/// Every stored `RecordsWrite`/`RecordsDelete` sharing `record_id`, in no
/// particular order. Both handlers use this to find the current "newest"
/// holder of the logical key before deciding whether an incoming message
/// supersedes it.
pub async fn existing_record_entries(
    message_store: &dyn MessageStore,
    tenant: &str,
    record_id: &str,
) -> Result<Vec<RecordEntry>, Error> {
    let mut filter = Filter::new();
    filter.insert("interface".to_string(), FilterValue::Equal(IndexValue::Text("Records".to_string())));
    filter.insert("recordId".to_string(), FilterValue::Equal(IndexValue::Text(record_id.to_string())));
    let (results, _) = message_store.query(tenant, &vec![filter], &QueryOptions::default()).await?;
    Ok(results
        .into_iter()
        .filter_map(|record| {
            let timestamp = match record.indexes.get("messageTimestamp") {
                Some(IndexValue::Text(s)) => s.clone(),
                _ => return None,
            };
            let is_delete = matches!(record.indexes.get("method"), Some(IndexValue::Text(m)) if m == "Delete");
            Some(RecordEntry { cid: record.cid, timestamp, is_delete })
        })
        .collect())
}

/// The entry among `entries` that currently wins the "newest wins" contest,
/// if any exist.
pub fn newest(entries: &[RecordEntry]) -> Option<&RecordEntry> {
    let mut winner: Option<&RecordEntry> = None;
    for entry in entries {
        winner = match winner {
            None => Some(entry),
            Some(current) if is_strictly_newer(&entry.timestamp, &entry.cid, &current.timestamp, &current.cid) => {
                Some(entry)
            }
            Some(current) => Some(current),
        };
    }
    winner
}

/// Maps a typed internal error to the HTTP-ish status spec §7's
/// propagation policy assigns it: PARSE failures to 400, AUTHENTICATE/
/// AUTHORIZE failures to 401, missing targets to 404, and everything else
/// (including store-layer failures this reference implementation has no
/// more specific mapping for) to 500.
pub fn error_to_status(err: &Error) -> Status {
    match err {
        Error::Message(_) | Error::Schema(_) => Status::bad_request(err.to_string()),
        Error::Auth(_) | Error::Permission(_) | Error::AuthenticationFailed(_) | Error::Did(_) => {
            Status::unauthorized(err.to_string())
        }
        Error::RecordNotFound(_) | Error::ProtocolNotFound(_) => Status::not_found(err.to_string()),
        Error::Store(crate::store::Error::NotFound(_)) => Status::not_found(err.to_string()),
        Error::Protocol(crate::protocol::Error::NotFound(_)) => Status::not_found(err.to_string()),
        Error::Protocol(
            crate::protocol::Error::UriNotNormalized(_)
            | crate::protocol::Error::PathNotFound(_)
            | crate::protocol::Error::SchemaMismatch(_)
            | crate::protocol::Error::DataFormatMismatch(_),
        ) => Status::bad_request(err.to_string()),
        Error::Conflict => Status::conflict(err.to_string()),
        Error::Store(_) | Error::Protocol(_) => Status::internal(err.to_string()),
    }
}

/// Spec §3's "newest wins": strictly newer iff the timestamp is later, or
/// tied and the CID sorts higher. Used by every interface's
/// CONFLICT-RESOLVE step to decide whether an incoming message supersedes
/// the current holder of its logical key.
pub fn is_strictly_newer(candidate_timestamp: &str, candidate_cid: &str, existing_timestamp: &str, existing_cid: &str) -> bool {
    match cmp_timestamps(candidate_timestamp, existing_timestamp) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => candidate_cid > existing_cid,
    }
}
