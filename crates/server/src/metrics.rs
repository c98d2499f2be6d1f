//! Prometheus metrics for the Vellum server.
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry profile names but no root hashes, owners or transaction hashes.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};
use vellum_pipeline::UploadOutcome;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static UPLOADS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("vellum_uploads_total", "Uploads by final outcome"),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static UPLOAD_ATTEMPTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vellum_upload_attempts_total",
            "Per-profile upload attempts by result",
        ),
        &["profile", "result"],
    )
    .expect("metric creation failed")
});

pub static FALLBACKS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vellum_fallbacks_total",
        "Times an upload moved on to the next profile",
    )
    .expect("metric creation failed")
});

pub static UNCONFIRMED_PAYMENTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vellum_unconfirmed_payments_total",
        "Uploads that proceeded without a confirmed payment receipt",
    )
    .expect("metric creation failed")
});

pub static BYTES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vellum_bytes_uploaded_total",
        "Total bytes of successful uploads",
    )
    .expect("metric creation failed")
});

pub static BYTES_DOWNLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vellum_bytes_downloaded_total",
        "Total verified bytes served",
    )
    .expect("metric creation failed")
});

pub static DOWNLOAD_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("vellum_download_errors_total", "Download failures by kind"),
        &["kind"],
    )
    .expect("metric creation failed")
});

pub static UPLOAD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "vellum_upload_duration_seconds",
            "Time taken by a full upload including fallback",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 900.0]),
    )
    .expect("metric creation failed")
});

pub static DOWNLOAD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "vellum_download_duration_seconds",
            "Time taken to fetch and verify a file",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests and embedded routers can call it freely.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(UPLOADS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_ATTEMPTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(FALLBACKS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UNCONFIRMED_PAYMENTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_DOWNLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DOWNLOAD_ERRORS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DOWNLOAD_DURATION.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record every attempt of a finished upload run.
pub fn record_upload(outcome: &UploadOutcome, size_bytes: u64) {
    for attempt in &outcome.attempts {
        let result = attempt.error_kind.map_or("success", |k| k.as_str());
        UPLOAD_ATTEMPTS
            .with_label_values(&[attempt.profile.as_str(), result])
            .inc();
    }
    FALLBACKS.inc_by(outcome.fallbacks() as u64);

    let label = if outcome.success {
        BYTES_UPLOADED.inc_by(size_bytes);
        if !outcome.payment_confirmed {
            UNCONFIRMED_PAYMENTS.inc();
        }
        "success"
    } else {
        outcome.error.as_ref().map_or("failed", |e| e.kind.as_str())
    };
    UPLOADS.with_label_values(&[label]).inc();
}
