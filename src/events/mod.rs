//! Component C6: the in-process publish/subscribe broker. `emit` matches
//! an accepted message's index map against every live subscription's
//! filters for its tenant and fans out synchronously (spec §4.6, §5).
//!
//! No teacher precedent — `web5-rust` has no subscription broker at all —
//! so this is grounded in the broadcast-bus shape `abp-runtime/src/bus.rs`
//! (`EventBus`/`EventSubscription`, one `tokio::sync` channel per
//! subscriber, stats on drop) from the `agent-backplane` pack repo,
//! adapted from one broadcast channel per bus to one `mpsc` channel per
//! subscription so each subscriber can carry its own filter set rather
//! than sharing one unfiltered feed. The spec's callback-style
//! `on(handler)` is translated to the idiomatic Rust reading: a consumer
//! pulls from [`Subscription::recv`] rather than registering a push
//! callback.
mod error;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::store::filter::{matches_any, Filters, IndexValue};

pub use error::Error;

/// One accepted message, reduced to what a subscriber needs: its CID and
/// the index map `emit` matched filters against.
#[derive(Clone, Debug, PartialEq)]
pub struct EmittedEvent {
    pub message_cid: String,
    pub indexes: BTreeMap<String, IndexValue>,
}

struct Listener {
    id: u64,
    filters: Filters,
    sender: mpsc::UnboundedSender<EmittedEvent>,
}

/// The broker itself. Cheaply `Clone`-able (an `Arc` handle), so a single
/// instance is shared across a `Dwn`'s handlers and every `Subscription`
/// it hands out.
#[derive(Clone, Default)]
pub struct EventStream {
    tenants: Arc<RwLock<HashMap<String, Vec<Listener>>>>,
    next_id: Arc<AtomicU64>,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifecycle no-op kept for parity with spec §4.6's `open()`; a fresh
    /// broker starts open, there is no connection to establish.
    pub fn open() -> Self {
        Self::new()
    }

    /// Registers a new subscription for `tenant`, matched against
    /// `filters` on every future `emit`. Past events are not replayed —
    /// that is `EventsQuery`'s job, against the durable `EventLog`.
    pub async fn subscribe(&self, tenant: &str, filters: Filters) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.tenants
            .write()
            .await
            .entry(tenant.to_string())
            .or_default()
            .push(Listener { id, filters, sender });
        Subscription { id, tenant: tenant.to_string(), receiver, broker: self.clone() }
    }

    /// Synchronously fans `indexes` out to every listener registered for
    /// `tenant` whose filters match. Spec §5 notes a production broker
    /// SHOULD bound listener queues and disconnect slow consumers; this
    /// reference implementation uses an unbounded channel per subscriber
    /// and accepts unbounded memory growth under a stalled consumer
    /// instead, appropriate for the in-process, single-node deployments
    /// this crate targets.
    pub async fn emit(&self, tenant: &str, message_cid: &str, indexes: &BTreeMap<String, IndexValue>) {
        let tenants = self.tenants.read().await;
        let Some(listeners) = tenants.get(tenant) else { return };
        for listener in listeners {
            if matches_any(&listener.filters, indexes) {
                let _ = listener.sender.send(EmittedEvent { message_cid: message_cid.to_string(), indexes: indexes.clone() });
            }
        }
    }

    async fn unregister(&self, tenant: &str, id: u64) {
        let mut tenants = self.tenants.write().await;
        if let Some(listeners) = tenants.get_mut(tenant) {
            listeners.retain(|listener| listener.id != id);
        }
    }

    /// Lifecycle no-op's counterpart: drops every registered listener.
    /// Subscriptions still held by callers will simply stop receiving
    /// events rather than erroring, matching `recv`'s "closed channel
    /// yields `None`" behavior.
    pub async fn close(&self) {
        self.tenants.write().await.clear();
    }
}

/// A live registration against the broker. Owned by whoever called
/// `subscribe`; spec §5 requires subscriptions be closed by their creator.
pub struct Subscription {
    id: u64,
    tenant: String,
    receiver: mpsc::UnboundedReceiver<EmittedEvent>,
    broker: EventStream,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Waits for the next event matching this subscription's filters.
    /// Returns `None` once the broker has been closed or this
    /// subscription has been unregistered elsewhere.
    pub async fn recv(&mut self) -> Option<EmittedEvent> {
        self.receiver.recv().await
    }

    /// Unregisters this subscription from the broker. Further `emit`
    /// calls will no longer reach it.
    pub async fn close(self) {
        self.broker.unregister(&self.tenant, self.id).await;
    }
}
