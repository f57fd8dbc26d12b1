pub mod crypto;
pub mod did;
pub mod message;
pub mod schema;
pub mod store;
pub mod protocol;
pub mod permission;
pub mod auth;
pub mod events;
pub mod handlers;
mod error;
mod node;

pub use error::{Error, Result};
pub use node::Dwn;

pub use message::{DescriptorFields, Interface, Method, Message, MessageAuthorization};
pub use handlers::{Reply, Status};
pub use events::Subscription;
