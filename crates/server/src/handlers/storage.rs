//! Storage endpoints: upload, download, existence and metadata.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::records::StorageRecord;
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use std::time::Instant;
use time::OffsetDateTime;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{info, instrument};
use uuid::Uuid;
use vellum_pipeline::{AttemptRecord, parse_root};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Network type selector shared by the GET endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct NetworkQuery {
    #[serde(rename = "networkType")]
    pub network_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeeSummary {
    pub sectors: u64,
    pub storage_fee: String,
    pub gas_fee: String,
    pub total_fee: String,
    pub gas_estimate_degraded: bool,
}

#[derive(Debug, Serialize)]
pub struct AttemptSummary {
    pub profile: String,
    pub role: String,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&AttemptRecord> for AttemptSummary {
    fn from(a: &AttemptRecord) -> Self {
        Self {
            profile: a.profile.clone(),
            role: a.role.to_string(),
            elapsed_ms: a.elapsed.as_millis() as u64,
            error: a.summary(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub record: StorageRecord,
    pub storage_hash: String,
    /// `primary` or `fallback`.
    pub network: String,
    pub tx_hash: Option<String>,
    pub explorer_url: Option<String>,
    pub payment_confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<FeeSummary>,
    pub attempts: Vec<AttemptSummary>,
}

/// A multipart file field written to an anonymous temp file.
struct StagedFile {
    file: tokio::fs::File,
    size: u64,
    file_name: Option<String>,
    content_type: Option<String>,
}

impl StagedFile {
    async fn from_field(field: &mut Field<'_>, max: u64) -> ApiResult<Self> {
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let std_file = tempfile::tempfile()
            .map_err(|e| ApiError::Internal(format!("failed to create staging file: {e}")))?;
        let mut file = tokio::fs::File::from_std(std_file);

        let mut size = 0u64;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read file field: {e}")))?
        {
            size += chunk.len() as u64;
            if size > max {
                return Err(ApiError::PayloadTooLarge { size, max });
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::Internal(format!("failed to stage upload: {e}")))?;
        }

        Ok(Self {
            file,
            size,
            file_name,
            content_type,
        })
    }

    async fn into_bytes(mut self) -> ApiResult<Bytes> {
        let io = |e: std::io::Error| ApiError::Internal(format!("failed to read staged upload: {e}"));
        self.file.flush().await.map_err(io)?;
        self.file.seek(SeekFrom::Start(0)).await.map_err(io)?;
        let mut data = Vec::with_capacity(self.size as usize);
        self.file.read_to_end(&mut data).await.map_err(io)?;
        Ok(Bytes::from(data))
    }
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// POST /api/storage/upload
#[instrument(skip_all)]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let max = state.config.server.max_upload_bytes;
    let mut owner_id = None;
    let mut network_type = None;
    let mut staged = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let text = |e: MultipartError| ApiError::BadRequest(format!("invalid form field: {e}"));
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => staged = Some(StagedFile::from_field(&mut field, max).await?),
            Some("owner_id") => owner_id = non_empty(field.text().await.map_err(text)?),
            Some("networkType") => network_type = non_empty(field.text().await.map_err(text)?),
            _ => {}
        }
    }

    let owner_id = owner_id.ok_or_else(|| ApiError::BadRequest("owner_id is required".into()))?;
    let staged = staged.ok_or_else(|| ApiError::BadRequest("file is required".into()))?;
    let file_name = staged.file_name.clone();
    let mime_type = staged
        .content_type
        .clone()
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
    let data = staged.into_bytes().await?;
    let size_bytes = data.len() as u64;

    let started = Instant::now();
    let (network_type, mut outcome) = state
        .pipeline
        .upload(
            data,
            Some(mime_type.clone()),
            network_type.as_deref(),
            &state.request_token(),
        )
        .await?;
    metrics::UPLOAD_DURATION.observe(started.elapsed().as_secs_f64());
    metrics::record_upload(&outcome, size_bytes);

    if !outcome.success {
        let error = outcome
            .error
            .take()
            .ok_or_else(|| ApiError::Internal("upload failed without an error".into()))?;
        return Err(error.into());
    }
    let (Some(root), Some(profile), Some(role)) =
        (outcome.root_hash, outcome.network.clone(), outcome.role)
    else {
        return Err(ApiError::Internal("successful upload without a root hash".into()));
    };

    let tx_hash = outcome.tx_hash.map(|tx| tx.to_string());
    let record = state
        .records
        .record(StorageRecord {
            record_id: Uuid::new_v4(),
            owner_id,
            root_hash: root.to_string(),
            file_name,
            mime_type,
            size_bytes,
            network_type,
            profile,
            network: role.to_string(),
            tx_hash: tx_hash.clone(),
            explorer_url: outcome.explorer_url.clone(),
            payment_confirmed: outcome.payment_confirmed,
            created_at: OffsetDateTime::now_utc(),
        })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!(root_hash = %root, record_id = %record.record_id, network = %role, "upload recorded");

    let fee = outcome.fee.as_ref().map(|quote| {
        let formatted = quote.formatted();
        FeeSummary {
            sectors: quote.sectors,
            storage_fee: formatted.storage_fee,
            gas_fee: formatted.gas_fee,
            total_fee: formatted.total_fee,
            gas_estimate_degraded: quote.is_degraded(),
        }
    });

    Ok(Json(UploadResponse {
        success: true,
        storage_hash: record.root_hash.clone(),
        network: record.network.clone(),
        tx_hash,
        explorer_url: record.explorer_url.clone(),
        payment_confirmed: record.payment_confirmed,
        fee,
        attempts: outcome.attempts.iter().map(AttemptSummary::from).collect(),
        record,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub root_hash: String,
    pub network_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub success: bool,
    /// Base64 of the verified bytes.
    pub data: String,
    pub size: u64,
    pub root_hash: String,
    pub network_type: String,
}

async fn fetch(
    state: &AppState,
    root_hash: &str,
    network_type: Option<&str>,
) -> ApiResult<(String, String, Bytes)> {
    let root = parse_root(root_hash)?;
    let started = Instant::now();
    let result = state
        .pipeline
        .download(&root, network_type, &state.request_token())
        .await;
    metrics::DOWNLOAD_DURATION.observe(started.elapsed().as_secs_f64());

    match result {
        Ok((network_type, retrieved)) => {
            metrics::BYTES_DOWNLOADED.inc_by(retrieved.value.len() as u64);
            Ok((root.to_string(), network_type, retrieved.value))
        }
        Err(e) => {
            metrics::DOWNLOAD_ERRORS
                .with_label_values(&[e.kind.as_str()])
                .inc();
            Err(e.into())
        }
    }
}

/// POST /api/storage/download
#[instrument(skip_all, fields(root_hash = %request.root_hash))]
pub async fn download_json(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<Json<DownloadResponse>> {
    let (root_hash, network_type, data) =
        fetch(&state, &request.root_hash, request.network_type.as_deref()).await?;
    Ok(Json(DownloadResponse {
        success: true,
        size: data.len() as u64,
        data: general_purpose::STANDARD.encode(&data),
        root_hash,
        network_type,
    }))
}

/// GET /api/storage/download/{root_hash}
#[instrument(skip_all, fields(root_hash = %root_hash))]
pub async fn download_raw(
    State(state): State<AppState>,
    Path(root_hash): Path<String>,
    Query(query): Query<NetworkQuery>,
) -> ApiResult<Response> {
    let (root_hash, _, data) = fetch(&state, &root_hash, query.network_type.as_deref()).await?;
    let disposition = format!("attachment; filename=\"{root_hash}.bin\"");
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, DEFAULT_MIME_TYPE.to_string()),
            (CONTENT_LENGTH, data.len().to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        Body::from(data),
    )
        .into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistsResponse {
    pub exists: bool,
    pub root_hash: String,
    pub network_type: String,
}

/// GET /api/storage/exists/{root_hash}
#[instrument(skip_all, fields(root_hash = %root_hash))]
pub async fn exists(
    State(state): State<AppState>,
    Path(root_hash): Path<String>,
    Query(query): Query<NetworkQuery>,
) -> ApiResult<Json<ExistsResponse>> {
    let root = parse_root(&root_hash)?;
    let (network_type, exists) = state
        .pipeline
        .exists(&root, query.network_type.as_deref(), &state.request_token())
        .await?;
    Ok(Json(ExistsResponse {
        exists,
        root_hash: root.to_string(),
        network_type,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub root_hash: String,
    pub size: u64,
    pub segments: u64,
    pub finalized: bool,
    pub replicas: Option<u32>,
    pub network_type: String,
    pub profile: String,
}

/// GET /api/storage/info/{root_hash}
#[instrument(skip_all, fields(root_hash = %root_hash))]
pub async fn info(
    State(state): State<AppState>,
    Path(root_hash): Path<String>,
    Query(query): Query<NetworkQuery>,
) -> ApiResult<Json<InfoResponse>> {
    let root = parse_root(&root_hash)?;
    let (network_type, described) = state
        .pipeline
        .describe(&root, query.network_type.as_deref(), &state.request_token())
        .await?;
    let info = described.value;
    Ok(Json(InfoResponse {
        root_hash: root.to_string(),
        size: info.size,
        segments: info.segments,
        finalized: info.finalized,
        replicas: info.replicas,
        network_type,
        profile: described.profile,
    }))
}
