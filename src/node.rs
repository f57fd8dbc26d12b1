//! The node: a tenant-addressable bundle of storage and event
//! collaborators, one method per interface/method pair, mirroring
//! `DwnServer`'s constructor-injected, `pub`-field shape
//! (`dwn/dwn_server.rs`) rather than a runtime `(interface, method)`
//! registry lookup. See [`crate::handlers`]'s module doc comment for why.
use crate::did::DidResolver;
use crate::events::{EventStream, Subscription};
use crate::handlers::events_get::{self, EventsGetMessage};
use crate::handlers::events_query::{self, EventsQueryMessage};
use crate::handlers::events_subscribe::{self, EventsSubscribeMessage};
use crate::handlers::messages_get::{self, MessagesGetMessage};
use crate::handlers::messages_query::{self, MessagesQueryMessage};
use crate::handlers::messages_subscribe::{self, MessagesSubscribeMessage};
use crate::handlers::permissions_grant::{self, PermissionsGrantMessage};
use crate::handlers::permissions_request::{self, PermissionsRequestMessage};
use crate::handlers::permissions_revoke::{self, PermissionsRevokeMessage};
use crate::handlers::protocols_configure::{self, ProtocolsConfigureMessage};
use crate::handlers::protocols_query::{self, ProtocolsQueryMessage};
use crate::handlers::records_delete::{self, RecordsDeleteMessage};
use crate::handlers::records_query::{self, RecordsQueryMessage};
use crate::handlers::records_read::{self, RecordsReadMessage};
use crate::handlers::records_subscribe::{self, RecordsSubscribeMessage};
use crate::handlers::records_write::{self, RecordsWriteMessage};
use crate::handlers::Reply;
use crate::store::{DataStore, EventLog, MessageStore};

/// Everything a tenant's messages are processed against. Construct once
/// per deployment and share it across every tenant; each handler call
/// takes the tenant's DID explicitly rather than binding one in.
pub struct Dwn {
    pub message_store: Box<dyn MessageStore>,
    pub data_store: Box<dyn DataStore>,
    pub event_log: Box<dyn EventLog>,
    pub event_stream: EventStream,
    pub did_resolver: Box<dyn DidResolver>,
}

impl Dwn {
    pub fn new(
        message_store: Box<dyn MessageStore>,
        data_store: Box<dyn DataStore>,
        event_log: Box<dyn EventLog>,
        event_stream: EventStream,
        did_resolver: Box<dyn DidResolver>,
    ) -> Self {
        Dwn { message_store, data_store, event_log, event_stream, did_resolver }
    }

    pub async fn records_write(&self, tenant: &str, message: RecordsWriteMessage, data: Option<Vec<u8>>) -> Reply {
        records_write::handle(
            self.message_store.as_ref(),
            self.data_store.as_ref(),
            self.event_log.as_ref(),
            &self.event_stream,
            self.did_resolver.as_ref(),
            tenant,
            message,
            data,
        )
        .await
    }

    pub async fn records_read(&self, tenant: &str, message: RecordsReadMessage) -> Reply {
        records_read::handle(self.message_store.as_ref(), self.data_store.as_ref(), self.did_resolver.as_ref(), tenant, message).await
    }

    pub async fn records_query(&self, tenant: &str, message: RecordsQueryMessage) -> Reply {
        records_query::handle(self.message_store.as_ref(), self.did_resolver.as_ref(), tenant, message).await
    }

    pub async fn records_delete(&self, tenant: &str, message: RecordsDeleteMessage) -> Reply {
        records_delete::handle(
            self.message_store.as_ref(),
            self.data_store.as_ref(),
            self.event_log.as_ref(),
            &self.event_stream,
            self.did_resolver.as_ref(),
            tenant,
            message,
        )
        .await
    }

    pub async fn records_subscribe(&self, tenant: &str, message: RecordsSubscribeMessage) -> (Reply, Option<Subscription>) {
        records_subscribe::handle(self.message_store.as_ref(), &self.event_stream, self.did_resolver.as_ref(), tenant, message).await
    }

    pub async fn protocols_configure(&self, tenant: &str, message: ProtocolsConfigureMessage) -> Reply {
        protocols_configure::handle(
            self.message_store.as_ref(),
            self.event_log.as_ref(),
            &self.event_stream,
            self.did_resolver.as_ref(),
            tenant,
            message,
        )
        .await
    }

    pub async fn protocols_query(&self, tenant: &str, message: ProtocolsQueryMessage) -> Reply {
        protocols_query::handle(self.message_store.as_ref(), self.did_resolver.as_ref(), tenant, message).await
    }

    pub async fn events_get(&self, tenant: &str, message: EventsGetMessage) -> Reply {
        events_get::handle(self.message_store.as_ref(), self.did_resolver.as_ref(), tenant, message).await
    }

    pub async fn events_query(&self, tenant: &str, message: EventsQueryMessage) -> Reply {
        events_query::handle(self.message_store.as_ref(), self.event_log.as_ref(), self.did_resolver.as_ref(), tenant, message).await
    }

    pub async fn events_subscribe(&self, tenant: &str, message: EventsSubscribeMessage) -> (Reply, Option<Subscription>) {
        events_subscribe::handle(self.message_store.as_ref(), &self.event_stream, self.did_resolver.as_ref(), tenant, message).await
    }

    pub async fn messages_get(&self, tenant: &str, message: MessagesGetMessage) -> Reply {
        messages_get::handle(self.message_store.as_ref(), self.did_resolver.as_ref(), tenant, message).await
    }

    pub async fn messages_query(&self, tenant: &str, message: MessagesQueryMessage) -> Reply {
        messages_query::handle(self.message_store.as_ref(), self.did_resolver.as_ref(), tenant, message).await
    }

    pub async fn messages_subscribe(&self, tenant: &str, message: MessagesSubscribeMessage) -> (Reply, Option<Subscription>) {
        messages_subscribe::handle(self.message_store.as_ref(), &self.event_stream, self.did_resolver.as_ref(), tenant, message).await
    }

    pub async fn permissions_grant(&self, tenant: &str, message: PermissionsGrantMessage) -> Reply {
        permissions_grant::handle(
            self.message_store.as_ref(),
            self.event_log.as_ref(),
            &self.event_stream,
            self.did_resolver.as_ref(),
            tenant,
            message,
        )
        .await
    }

    pub async fn permissions_revoke(&self, tenant: &str, message: PermissionsRevokeMessage) -> Reply {
        permissions_revoke::handle(
            self.message_store.as_ref(),
            self.event_log.as_ref(),
            &self.event_stream,
            self.did_resolver.as_ref(),
            tenant,
            message,
        )
        .await
    }

    pub async fn permissions_request(&self, tenant: &str, message: PermissionsRequestMessage) -> Reply {
        permissions_request::handle(
            self.message_store.as_ref(),
            self.event_log.as_ref(),
            &self.event_stream,
            self.did_resolver.as_ref(),
            tenant,
            message,
        )
        .await
    }
}
