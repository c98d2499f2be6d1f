//! Application state shared across handlers.

use crate::records::RecordSink;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vellum_core::AppConfig;
use vellum_pipeline::StoragePipeline;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<StoragePipeline>,
    pub records: Arc<dyn RecordSink>,
    /// Cancelled on shutdown so in-flight pipelines stop at the next await.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        pipeline: StoragePipeline,
        records: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            records,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token for one request, cancelled with the server.
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}
