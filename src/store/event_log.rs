//! `EventLog`: an append-only, per-tenant, watermark-ordered record of
//! every message CID the node has accepted, backing `EventsQuery` and
//! `EventsSubscribe`'s replay-from-cursor behavior.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::filter::{matches_any, Filters, IndexValue};
use super::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub watermark: u64,
    pub cid: String,
    pub indexes: BTreeMap<String, IndexValue>,
}

#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, tenant: &str, cid: &str, indexes: BTreeMap<String, IndexValue>) -> Result<u64, Error>;

    /// Events with watermark strictly greater than `cursor`, matching any
    /// of `filters`, in watermark order.
    async fn query_events(
        &self,
        tenant: &str,
        filters: &Filters,
        cursor: Option<u64>,
    ) -> Result<Vec<Event>, Error>;

    async fn delete_events_by_cid(&self, tenant: &str, cids: &[String]) -> Result<(), Error>;
}

#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    tenants: Arc<RwLock<HashMap<String, TenantLog>>>,
}

#[derive(Clone, Default)]
struct TenantLog {
    next_watermark: u64,
    events: Vec<Event>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, tenant: &str, cid: &str, indexes: BTreeMap<String, IndexValue>) -> Result<u64, Error> {
        let mut tenants = self.tenants.write().await;
        let log = tenants.entry(tenant.to_string()).or_default();
        let watermark = log.next_watermark;
        log.next_watermark += 1;
        log.events.push(Event { watermark, cid: cid.to_string(), indexes });
        Ok(watermark)
    }

    async fn query_events(
        &self,
        tenant: &str,
        filters: &Filters,
        cursor: Option<u64>,
    ) -> Result<Vec<Event>, Error> {
        let tenants = self.tenants.read().await;
        let Some(log) = tenants.get(tenant) else {
            return Ok(Vec::new());
        };
        Ok(log
            .events
            .iter()
            .filter(|event| match cursor {
                Some(c) => event.watermark > c,
                None => true,
            })
            .filter(|event| matches_any(filters, &event.indexes))
            .cloned()
            .collect())
    }

    async fn delete_events_by_cid(&self, tenant: &str, cids: &[String]) -> Result<(), Error> {
        let mut tenants = self.tenants.write().await;
        if let Some(log) = tenants.get_mut(tenant) {
            log.events.retain(|event| !cids.contains(&event.cid));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_assigns_monotonic_watermarks() {
        let log = InMemoryEventLog::new();
        let w1 = log.append("t", "cid-1", BTreeMap::new()).await.unwrap();
        let w2 = log.append("t", "cid-2", BTreeMap::new()).await.unwrap();
        assert!(w2 > w1);
    }

    #[tokio::test]
    async fn query_events_respects_cursor() {
        let log = InMemoryEventLog::new();
        log.append("t", "cid-1", BTreeMap::new()).await.unwrap();
        let w2 = log.append("t", "cid-2", BTreeMap::new()).await.unwrap();
        log.append("t", "cid-3", BTreeMap::new()).await.unwrap();

        let events = log.query_events("t", &Filters::new(), Some(w2)).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].cid, "cid-3");
    }

    #[tokio::test]
    async fn delete_events_by_cid_removes_matching_entries() {
        let log = InMemoryEventLog::new();
        log.append("t", "cid-1", BTreeMap::new()).await.unwrap();
        log.append("t", "cid-2", BTreeMap::new()).await.unwrap();
        log.delete_events_by_cid("t", &["cid-1".to_string()]).await.unwrap();
        let events = log.query_events("t", &Filters::new(), None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].cid, "cid-2");
    }
}
