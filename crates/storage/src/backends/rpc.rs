//! JSON-RPC storage node backend.
//!
//! Speaks the `zgs_*` method family: `zgs_getFileInfo`, `zgs_uploadSegment`
//! and `zgs_downloadSegment`. Segment payloads travel base64 encoded.

use crate::error::{StorageError, StorageResult};
use crate::traits::{FileInfo, SegmentAck, SegmentWithProof, StorageNode};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, instrument};
use vellum_core::RootHash;

const METHOD_NOT_FOUND: i64 = -32601;

/// Storage node reached over HTTP JSON-RPC.
pub struct RpcStorageNode {
    http: reqwest::Client,
    endpoint: String,
    segment_size: u64,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcFileInfo {
    tx: RpcFileTx,
    finalized: bool,
    #[serde(default)]
    uploaded_seg_num: u64,
    #[serde(default)]
    replicas: Option<u32>,
}

#[derive(Deserialize)]
struct RpcFileTx {
    size: u64,
}

impl RpcStorageNode {
    pub fn new(endpoint: &str, segment_size: u64, timeout: Duration) -> StorageResult<Self> {
        vellum_core::merkle::validate_segment_size(segment_size)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            segment_size,
            next_id: AtomicU64::new(1),
        })
    }

    async fn request(&self, method: &str, params: Value) -> StorageResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let unavailable = |reason: String| StorageError::Unavailable {
            endpoint: self.endpoint.clone(),
            reason,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| unavailable(format!("{method}: {e}")))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(unavailable(format!("{method}: HTTP {status}: {text}")));
        }

        let parsed: RpcResponse = serde_json::from_str(&text)
            .map_err(|e| StorageError::Malformed(format!("{method}: {e}")))?;
        if let Some(error) = parsed.error {
            if error.code == METHOD_NOT_FOUND {
                return Err(StorageError::Unsupported(method.to_string()));
            }
            return Err(StorageError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }
}

/// Nodes phrase this as "already uploaded" or "has already been uploaded".
fn is_already_uploaded(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("already") && message.contains("uploaded")
}

#[async_trait]
impl StorageNode for RpcStorageNode {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[instrument(skip(self), fields(backend = "rpc", endpoint = %self.endpoint, root = %root))]
    async fn file_info(&self, root: &RootHash) -> StorageResult<Option<FileInfo>> {
        let value = self.request("zgs_getFileInfo", json!([root])).await?;
        if value.is_null() {
            return Ok(None);
        }
        let info: RpcFileInfo = serde_json::from_value(value)
            .map_err(|e| StorageError::Malformed(format!("zgs_getFileInfo: {e}")))?;
        Ok(Some(FileInfo {
            root: *root,
            size: info.tx.size,
            segments: info.tx.size.div_ceil(self.segment_size),
            finalized: info.finalized,
            replicas: info.replicas,
            uploaded_segments: info.uploaded_seg_num,
        }))
    }

    #[instrument(skip(self, segment), fields(backend = "rpc", endpoint = %self.endpoint, root = %segment.root, index = segment.index))]
    async fn upload_segment(&self, segment: SegmentWithProof) -> StorageResult<SegmentAck> {
        let index = segment.index;
        let params = json!([{
            "root": segment.root,
            "index": index,
            "data": general_purpose::STANDARD.encode(&segment.data),
            "proof": segment.proof,
            "fileSize": segment.file_size,
        }]);
        match self.request("zgs_uploadSegment", params).await {
            Ok(_) => Ok(SegmentAck::Stored),
            Err(StorageError::Rpc { message, .. }) if is_already_uploaded(&message) => {
                debug!(index, "segment already stored on node");
                Ok(SegmentAck::AlreadyStored)
            }
            Err(StorageError::Rpc { message, .. }) => Err(StorageError::SegmentRejected {
                index,
                reason: message,
            }),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(backend = "rpc", endpoint = %self.endpoint, root = %root))]
    async fn download_segments(
        &self,
        root: &RootHash,
        start: u64,
        end: u64,
    ) -> StorageResult<Bytes> {
        let value = self
            .request("zgs_downloadSegment", json!([root, start, end]))
            .await?;
        let encoded = match value {
            Value::Null => {
                return Err(StorageError::NotFound(format!(
                    "{root} segments {start}..{end}"
                )));
            }
            Value::String(s) => s,
            other => {
                return Err(StorageError::Malformed(format!(
                    "zgs_downloadSegment: expected base64 string, got {other}"
                )));
            }
        };
        general_purpose::STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(|e| StorageError::Malformed(format!("zgs_downloadSegment: {e}")))
    }
}
