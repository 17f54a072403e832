//! Persistent record cache backed by a local sled database.
//!
//! Values are JSON-encoded `Option<Record>`, so a stored `null` keeps
//! marking ids known not to exist across runs and no fetch is retried
//! for them.

use async_trait::async_trait;
use geneagraph_core::{Cache, CacheStatus, Record, RecordId, TraverseError, TraverseResult};
use std::path::Path;

pub struct SledCache {
    db: sled::Db,
}

impl SledCache {
    pub fn open(path: &Path) -> Result<Self, sled::Error> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    /// Namespaced key, collision-free per record id.
    fn key(id: RecordId) -> String {
        format!("record::{id}")
    }
}

#[async_trait]
impl Cache for SledCache {
    async fn get(&self, id: RecordId) -> TraverseResult<(CacheStatus, Option<Record>)> {
        let bytes = self
            .db
            .get(Self::key(id))
            .map_err(|e| TraverseError::Cache(e.to_string()))?;
        match bytes {
            None => Ok((CacheStatus::Miss, None)),
            Some(bytes) => {
                let value: Option<Record> = serde_json::from_slice(&bytes)
                    .map_err(|e| TraverseError::Cache(e.to_string()))?;
                Ok((CacheStatus::Hit, value))
            }
        }
    }

    async fn set(&self, id: RecordId, value: Option<&Record>) -> TraverseResult<()> {
        let bytes =
            serde_json::to_vec(&value).map_err(|e| TraverseError::Cache(e.to_string()))?;
        self.db
            .insert(Self::key(id).into_bytes(), bytes)
            .map_err(|e| TraverseError::Cache(e.to_string()))?;
        Ok(())
    }
}
