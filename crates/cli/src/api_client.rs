use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::Url;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid server URL")?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("failed to build API URL")
    }

    fn with_network(&self, path: &str, network_type: Option<&str>) -> Result<Url> {
        let mut url = self.url(path)?;
        if let Some(network_type) = network_type {
            url.query_pairs_mut().append_pair("networkType", network_type);
        }
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => anyhow::bail!(
                "API error ({}): {}",
                status,
                err.message.unwrap_or(err.error)
            ),
            Err(_) => anyhow::bail!("API error ({}): {}", status, body),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = retry_request(|| self.http.get(url.clone()).send()).await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_json(self.url("/api/health")?).await
    }

    /// Uploads are not retried here; the server already walks its fallback
    /// profiles and a blind retry could pay twice.
    pub async fn upload(
        &self,
        data: Bytes,
        file_name: &str,
        owner_id: &str,
        network_type: Option<&str>,
    ) -> Result<UploadResponse> {
        let file = Part::stream(reqwest::Body::from(data))
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;
        let mut form = Form::new()
            .text("owner_id", owner_id.to_string())
            .part("file", file);
        if let Some(network_type) = network_type {
            form = form.text("networkType", network_type.to_string());
        }

        let response = self
            .http
            .post(self.url("/api/storage/upload")?)
            .multipart(form)
            .send()
            .await
            .context("upload request failed")?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Fetch the verified bytes of a file as served by the raw endpoint.
    pub async fn download(&self, root_hash: &str, network_type: Option<&str>) -> Result<Bytes> {
        let url = self.with_network(&format!("/api/storage/download/{root_hash}"), network_type)?;
        let response = retry_request(|| self.http.get(url.clone()).send()).await?;
        Ok(Self::check(response).await?.bytes().await?)
    }

    pub async fn exists(&self, root_hash: &str, network_type: Option<&str>) -> Result<ExistsResponse> {
        let url = self.with_network(&format!("/api/storage/exists/{root_hash}"), network_type)?;
        self.get_json(url).await
    }

    pub async fn info(&self, root_hash: &str, network_type: Option<&str>) -> Result<InfoResponse> {
        let url = self.with_network(&format!("/api/storage/info/{root_hash}"), network_type)?;
        self.get_json(url).await
    }
}

/// Retry idempotent requests on connection errors and 503 responses.
async fn retry_request<F, Fut>(mut make_request: F) -> reqwest::Result<reqwest::Response>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = reqwest::Result<reqwest::Response>>,
{
    const MAX_RETRIES: u32 = 2;
    let mut attempt = 0;

    loop {
        match make_request().await {
            // 502 and 504 already reflect every profile failing.
            Ok(response) if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE => {
                attempt += 1;
                if attempt > MAX_RETRIES {
                    return Ok(response);
                }
                let delay = Duration::from_millis(250 << (attempt - 1));
                tracing::warn!(status = %response.status(), ?delay, "server unavailable, retrying");
                tokio::time::sleep(delay).await;
            }
            Ok(response) => return Ok(response),
            Err(e) if e.is_connect() && attempt < MAX_RETRIES => {
                attempt += 1;
                let delay = Duration::from_millis(250 << (attempt - 1));
                tracing::warn!(error = %e, ?delay, "request failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub default_network_type: String,
    #[serde(default)]
    pub networks: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct FeeSummary {
    pub sectors: u64,
    pub storage_fee: String,
    pub gas_fee: String,
    pub total_fee: String,
    pub gas_estimate_degraded: bool,
}

#[derive(Debug, Deserialize)]
pub struct AttemptSummary {
    pub profile: String,
    pub role: String,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StoredRecord {
    pub record_id: String,
    pub network_type: String,
    pub profile: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub record: StoredRecord,
    pub storage_hash: String,
    pub network: String,
    pub tx_hash: Option<String>,
    pub explorer_url: Option<String>,
    pub payment_confirmed: bool,
    pub fee: Option<FeeSummary>,
    #[serde(default)]
    pub attempts: Vec<AttemptSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistsResponse {
    pub exists: bool,
    pub root_hash: String,
    pub network_type: String,
}

#[derive(Debug, Deserialize)]
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
