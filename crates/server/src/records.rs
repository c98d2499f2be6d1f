//! Storage records handed to the surrounding application.
//!
//! The server does not own user or file metadata. After a successful upload it
//! passes a [`StorageRecord`] to a [`RecordSink`]; deployments plug in their own
//! sink, the in-memory one backs tests and local development.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// What was stored, where and for whom.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StorageRecord {
    pub record_id: Uuid,
    pub owner_id: String,
    pub root_hash: String,
    pub file_name: Option<String>,
    pub mime_type: String,
    pub size_bytes: u64,
    pub network_type: String,
    /// Profile that accepted the upload.
    pub profile: String,
    /// `primary` or `fallback`.
    pub network: String,
    pub tx_hash: Option<String>,
    pub explorer_url: Option<String>,
    pub payment_confirmed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, thiserror::Error)]
#[error("record sink failed: {0}")]
pub struct RecordError(pub String);

#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn record(&self, record: StorageRecord) -> Result<StorageRecord, RecordError>;
}

/// Records kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRecords {
    records: DashMap<Uuid, StorageRecord>,
}

impl InMemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, record_id: Uuid) -> Option<StorageRecord> {
        self.records.get(&record_id).map(|r| r.value().clone())
    }

    pub fn by_owner(&self, owner_id: &str) -> Vec<StorageRecord> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordSink for InMemoryRecords {
    async fn record(&self, record: StorageRecord) -> Result<StorageRecord, RecordError> {
        self.records.insert(record.record_id, record.clone());
        Ok(record)
    }
}
