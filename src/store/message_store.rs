//! `MessageStore`: the content-addressed, per-tenant record of every
//! message a DWN has accepted, indexed by the descriptor properties each
//! handler chooses to index. Grounded in the teacher's `common/database.rs`
//! (`Database::query`, partition-by-equality-filter, sort, paginate) and
//! `dwn/index.rs`'s `Index::query`/`subslice_cursor_limit`.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::filter::{matches_any, total_order, Cursor, Filters, IndexValue, QueryOptions};
use super::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct IndexedMessage {
    pub cid: String,
    pub indexes: BTreeMap<String, IndexValue>,
    pub message: Vec<u8>,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn put(
        &self,
        tenant: &str,
        cid: &str,
        indexes: BTreeMap<String, IndexValue>,
        message: Vec<u8>,
    ) -> Result<(), Error>;

    async fn get(&self, tenant: &str, cid: &str) -> Result<Option<IndexedMessage>, Error>;

    async fn query(
        &self,
        tenant: &str,
        filters: &Filters,
        options: &QueryOptions,
    ) -> Result<(Vec<IndexedMessage>, Option<Cursor>), Error>;

    async fn delete(&self, tenant: &str, cid: &str) -> Result<(), Error>;

    async fn clear(&self, tenant: &str) -> Result<(), Error>;
}

#[derive(Clone, Default)]
pub struct InMemoryMessageStore {
    tenants: Arc<RwLock<HashMap<String, BTreeMap<String, IndexedMessage>>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn put(
        &self,
        tenant: &str,
        cid: &str,
        indexes: BTreeMap<String, IndexValue>,
        message: Vec<u8>,
    ) -> Result<(), Error> {
        let mut tenants = self.tenants.write().await;
        let records = tenants.entry(tenant.to_string()).or_default();
        records.insert(cid.to_string(), IndexedMessage { cid: cid.to_string(), indexes, message });
        Ok(())
    }

    async fn get(&self, tenant: &str, cid: &str) -> Result<Option<IndexedMessage>, Error> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(tenant).and_then(|records| records.get(cid).cloned()))
    }

    async fn query(
        &self,
        tenant: &str,
        filters: &Filters,
        options: &QueryOptions,
    ) -> Result<(Vec<IndexedMessage>, Option<Cursor>), Error> {
        let tenants = self.tenants.read().await;
        let Some(records) = tenants.get(tenant) else {
            return Ok((Vec::new(), None));
        };

        let mut matched: Vec<&IndexedMessage> =
            records.values().filter(|record| matches_any(filters, &record.indexes)).collect();

        matched.sort_by(|a, b| {
            let a_value = a.indexes.get(&options.sort_property);
            let b_value = b.indexes.get(&options.sort_property);
            match (a_value, b_value) {
                (Some(av), Some(bv)) => total_order((av, &a.cid), (bv, &b.cid), options.sort_direction),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.cid.cmp(&b.cid),
            }
        });

        let start = if let Some(cursor) = &options.cursor {
            matched
                .iter()
                .position(|record| {
                    record
                        .indexes
                        .get(&options.sort_property)
                        .is_some_and(|v| *v == cursor.value)
                        && record.cid == cursor.message_cid
                })
                .map(|idx| idx + 1)
                .unwrap_or(0)
        } else {
            0
        };

        let remaining = &matched[start.min(matched.len())..];
        let page: Vec<IndexedMessage> = match options.limit {
            Some(limit) => remaining.iter().take(limit).map(|r| (*r).clone()).collect(),
            None => remaining.iter().map(|r| (*r).clone()).collect(),
        };

        let next_cursor = if options.limit.is_some_and(|limit| remaining.len() > limit) {
            page.last().and_then(|last| {
                last.indexes
                    .get(&options.sort_property)
                    .map(|value| Cursor { value: value.clone(), message_cid: last.cid.clone() })
            })
        } else {
            None
        };

        Ok((page, next_cursor))
    }

    async fn delete(&self, tenant: &str, cid: &str) -> Result<(), Error> {
        let mut tenants = self.tenants.write().await;
        if let Some(records) = tenants.get_mut(tenant) {
            records.remove(cid);
        }
        Ok(())
    }

    async fn clear(&self, tenant: &str) -> Result<(), Error> {
        self.tenants.write().await.remove(tenant);
        Ok(())
    }
}
