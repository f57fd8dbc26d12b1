//! Component C2: JSON Schema validation of every incoming message
//! descriptor against its interface/method's compiled shape.
mod error;
pub mod known;
mod validator;

pub use error::Error;
pub use validator::SchemaValidator;
