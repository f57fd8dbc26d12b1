//! Interface/Method vocabulary and the trait every method-specific
//! descriptor implements.
//!
//! The teacher's orphaned `records_write.rs` models `Descriptor` as one
//! struct carrying every interface's optional fields (`protocol`, `schema`,
//! `dataCid`, ...). The system spec's own design notes call that shape out
//! as something to redo: each interface/method pair gets its own descriptor
//! type, tagged by a shared accessor trait rather than by a God struct of
//! `Option`s. `handlers/*.rs` defines the concrete descriptor for each
//! method; this module defines the vocabulary and the trait they all wire
//! into the message envelope through.
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interface {
    Records,
    Protocols,
    Permissions,
    Events,
    Messages,
}

impl Interface {
    /// The indexed-property string form, matching the serde tag so index
    /// maps and store filters can compare against it directly.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interface::Records => "Records",
            Interface::Protocols => "Protocols",
            Interface::Permissions => "Permissions",
            Interface::Events => "Events",
            Interface::Messages => "Messages",
        }
    }
}

impl std::fmt::Display for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Write,
    Query,
    Read,
    Delete,
    Subscribe,
    Configure,
    Grant,
    Revoke,
    Request,
    Get,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Write => "Write",
            Method::Query => "Query",
            Method::Read => "Read",
            Method::Delete => "Delete",
            Method::Subscribe => "Subscribe",
            Method::Configure => "Configure",
            Method::Grant => "Grant",
            Method::Revoke => "Revoke",
            Method::Request => "Request",
            Method::Get => "Get",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the message pipeline needs to see out of every descriptor,
/// regardless of which interface/method pair it belongs to.
pub trait DescriptorFields {
    fn interface(&self) -> Interface;
    fn method(&self) -> Method;
    fn message_timestamp(&self) -> &str;
}
