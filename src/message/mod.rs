//! Component C1: message codec, CID computation, JWS, and the envelope
//! every interface/method descriptor is carried in.
mod codec;
mod descriptor;
mod envelope;
mod error;
mod jws;
mod timestamp;

pub use codec::{cid, cid_of_value, decode, encode, encode_value, parse_cid};
pub use descriptor::{DescriptorFields, Interface, Method};
pub use envelope::{DelegatedGrant, Message, MessageAuthorization, SignaturePayload};
pub use error::Error;
pub use jws::{GeneralJws, SignatureEntry};
pub use timestamp::{cmp as cmp_timestamps, now as now_timestamp, validate as validate_timestamp};
