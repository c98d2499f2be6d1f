//! Health endpoint.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub default_network_type: String,
    /// Profile names per network type, in fallback order.
    pub networks: BTreeMap<String, Vec<String>>,
}

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let registry = state.pipeline.registry();
    let mut networks = BTreeMap::new();
    for network_type in registry.network_types() {
        let (_, handles) = registry.resolve(Some(network_type))?;
        networks.insert(
            network_type.to_string(),
            handles.iter().map(|h| h.name().to_string()).collect(),
        );
    }

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        default_network_type: registry.default_type().to_string(),
        networks,
    }))
}
