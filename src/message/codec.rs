//! Canonical encoding and content addressing (component C1).
//!
//! The system spec names this "a deterministic, canonical binary object
//! encoding capable of producing a CID via a multihash" without picking one.
//! The teacher's own unwired `RecordsWrite` draft (`dwn/records_write.rs`,
//! `Cid::dagcbor_cid`) already answers this with DAG-CBOR + SHA2-256 + CIDv1;
//! this module adopts that answer. DAG-CBOR's canonical form (sorted map
//! keys, minimal-width integers) gives the encode/decode round-trip
//! invariant in spec §8 for free — no hand-rolled canonicalization pass is
//! needed.
use cid::Cid as RawCid;
use multihash::Multihash;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::Error;

/// The `raw` IPLD codec tag is `0x55`; DAG-CBOR is `0x71`. Messages are
/// encoded as DAG-CBOR objects, so every CID in this crate uses `0x71`.
const DAG_CBOR_CODEC: u64 = 0x71;
const SHA2_256: u64 = 0x12;

/// Encode `value` as canonical DAG-CBOR bytes.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    Ok(serde_ipld_dagcbor::to_vec(value)?)
}

/// Decode canonical DAG-CBOR bytes back into `T`.
pub fn decode<T: for<'a> serde::Deserialize<'a>>(bytes: &[u8]) -> Result<T, Error> {
    Ok(serde_ipld_dagcbor::from_slice(bytes)?)
}

/// Encode an arbitrary JSON value, first rejecting anything that has no
/// DAG-CBOR representation. JSON has no `undefined`; a `null` anywhere in
/// the tree is treated as its stand-in, since every descriptor in this
/// crate omits absent fields rather than nulling them.
pub fn encode_value(value: &Value) -> Result<Vec<u8>, Error> {
    reject_unsupported(value)?;
    encode(value)
}

fn reject_unsupported(value: &Value) -> Result<(), Error> {
    match value {
        Value::Null => Err(Error::EncodingUnsupportedValue(
            "null (undefined) is not an encodable value".to_string(),
        )),
        Value::Object(map) => {
            for v in map.values() {
                reject_unsupported(v)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for v in items {
                reject_unsupported(v)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Compute the CIDv1 (base32, DAG-CBOR, SHA2-256) of `value`'s canonical
/// encoding.
pub fn cid<T: Serialize>(value: &T) -> Result<String, Error> {
    let bytes = encode(value)?;
    Ok(cid_of_bytes(&bytes).to_string())
}

pub fn cid_of_value(value: &Value) -> Result<String, Error> {
    let bytes = encode_value(value)?;
    Ok(cid_of_bytes(&bytes).to_string())
}

fn cid_of_bytes(bytes: &[u8]) -> RawCid {
    let digest = Sha256::digest(bytes);
    let hash = Multihash::wrap(SHA2_256, &digest).expect("sha2-256 digest fits a 64-byte multihash");
    RawCid::new_v1(DAG_CBOR_CODEC, hash)
}

/// Parses a CID string, surfacing `CidInvalid` rather than the underlying
/// `cid` crate error type.
pub fn parse_cid(s: &str) -> Result<RawCid, Error> {
    s.parse::<RawCid>().map_err(|e| Error::CidInvalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trip_cid_is_stable() {
        let value = json!({"b": 2, "a": 1, "c": [1, 2, 3]});
        let bytes = encode_value(&value).unwrap();
        let decoded: Value = decode(&bytes).unwrap();
        assert_eq!(cid_of_value(&value).unwrap(), cid_of_value(&decoded).unwrap());
    }

    #[test]
    fn key_order_does_not_affect_cid() {
        let a = json!({"b": 2, "a": 1});
        let b = json!({"a": 1, "b": 2});
        assert_eq!(cid_of_value(&a).unwrap(), cid_of_value(&b).unwrap());
    }

    #[test]
    fn null_is_rejected() {
        let value = json!({"a": null});
        assert!(encode_value(&value).is_err());
    }

    #[test]
    fn cid_parses_back() {
        let value = json!({"hello": "world"});
        let cid_str = cid_of_value(&value).unwrap();
        assert!(parse_cid(&cid_str).is_ok());
    }
}
