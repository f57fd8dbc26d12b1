//! Component C3: the three storage interfaces every handler persists
//! through — `MessageStore`, `DataStore`, `EventLog` — plus the filter
//! grammar they share.
pub mod data_store;
mod error;
pub mod event_log;
pub mod filter;
pub mod message_store;

pub use data_store::{DataStore, InMemoryDataStore, PutResult};
pub use error::Error;
pub use event_log::{Event, EventLog, InMemoryEventLog};
pub use filter::{Cursor, Filter, FilterValue, Filters, IndexValue, QueryOptions, RangeFilter, SortDirection};
pub use message_store::{IndexedMessage, InMemoryMessageStore, MessageStore};
