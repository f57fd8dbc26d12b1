//! `DataStore`: content-addressed storage for the bytes a `RecordsWrite`
//! carries, separate from the message envelope itself so that records
//! can be associated with data that was uploaded by an earlier write
//! (`RecordsWrite.data_cid` unchanged, no re-upload needed).
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutResult {
    pub data_cid: String,
    pub data_size: u64,
}

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Stores `data` under the tenant and the record it belongs to,
    /// returning the CID and size computed from the bytes themselves.
    async fn put(&self, tenant: &str, record_id: &str, data: Vec<u8>) -> Result<PutResult, Error>;

    async fn get(&self, tenant: &str, record_id: &str, data_cid: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Associates an already-stored blob (identified by `data_cid`) with
    /// another `record_id` under the same tenant, for `RecordsWrite`
    /// messages that reuse a prior write's data without re-uploading it.
    async fn associate(&self, tenant: &str, record_id: &str, data_cid: &str) -> Result<(), Error>;

    async fn delete(&self, tenant: &str, record_id: &str, data_cid: &str) -> Result<(), Error>;
}

fn raw_cid(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let hash = multihash::Multihash::<64>::wrap(0x12, &digest)
        .expect("sha2-256 digest fits a 64-byte multihash");
    cid::Cid::new_v1(0x55, hash).to_string()
}

#[derive(Clone, Default)]
pub struct InMemoryDataStore {
    // (tenant, data_cid) -> bytes.
    blobs: Arc<RwLock<HashMap<(String, String), Vec<u8>>>>,
    // (tenant, data_cid) -> number of records currently associated with it.
    ref_counts: Arc<RwLock<HashMap<(String, String), u64>>>,
    // (tenant, record_id) -> data_cid
    associations: Arc<RwLock<HashMap<(String, String), String>>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops `record_id`'s association with whatever `data_cid` it
    /// currently points to (if any) and decrements that blob's refcount,
    /// removing the blob once nothing references it. Called before a
    /// record's association changes, so put/associate/delete can't leak
    /// a stale reference onto the blob a record used to point to.
    async fn release_current_association(&self, tenant: &str, record_id: &str) {
        let Some(previous_cid) = self.associations.write().await.remove(&(tenant.to_string(), record_id.to_string())) else {
            return;
        };
        self.release(tenant, &previous_cid).await;
    }

    async fn release(&self, tenant: &str, data_cid: &str) {
        let key = (tenant.to_string(), data_cid.to_string());
        let mut counts = self.ref_counts.write().await;
        let Some(count) = counts.get_mut(&key) else { return };
        *count = count.saturating_sub(1);
        if *count == 0 {
            counts.remove(&key);
            self.blobs.write().await.remove(&key);
        }
    }

    async fn retain(&self, tenant: &str, data_cid: &str) {
        *self.ref_counts.write().await.entry((tenant.to_string(), data_cid.to_string())).or_insert(0) += 1;
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn put(&self, tenant: &str, record_id: &str, data: Vec<u8>) -> Result<PutResult, Error> {
        let data_cid = raw_cid(&data);
        let data_size = data.len() as u64;
        self.release_current_association(tenant, record_id).await;
        self.blobs.write().await.entry((tenant.to_string(), data_cid.clone())).or_insert(data);
        self.retain(tenant, &data_cid).await;
        self.associations
            .write()
            .await
            .insert((tenant.to_string(), record_id.to_string()), data_cid.clone());
        Ok(PutResult { data_cid, data_size })
    }

    async fn get(&self, tenant: &str, record_id: &str, data_cid: &str) -> Result<Option<Vec<u8>>, Error> {
        let associations = self.associations.read().await;
        match associations.get(&(tenant.to_string(), record_id.to_string())) {
            Some(associated) if associated == data_cid => {
                Ok(self.blobs.read().await.get(&(tenant.to_string(), data_cid.to_string())).cloned())
            }
            _ => Ok(None),
        }
    }

    async fn associate(&self, tenant: &str, record_id: &str, data_cid: &str) -> Result<(), Error> {
        if !self.blobs.read().await.contains_key(&(tenant.to_string(), data_cid.to_string())) {
            return Err(Error::DataNotFound(data_cid.to_string()));
        }
        self.release_current_association(tenant, record_id).await;
        self.retain(tenant, data_cid).await;
        self.associations
            .write()
            .await
            .insert((tenant.to_string(), record_id.to_string()), data_cid.to_string());
        Ok(())
    }

    async fn delete(&self, tenant: &str, record_id: &str, data_cid: &str) -> Result<(), Error> {
        self.associations.write().await.remove(&(tenant.to_string(), record_id.to_string()));
        self.release(tenant, data_cid).await;
        Ok(())
    }
}
