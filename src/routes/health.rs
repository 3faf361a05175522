//! Health and build-info endpoints
//!
//! - /api/healthz - Liveness probe, `{"status": "ok"}` while the process runs
//! - /api/version - Build and crypto configuration for deployment checks

use hyper::{Response, StatusCode};
use serde::Serialize;

use super::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Liveness probe
pub fn health_check() -> Response<BoxBody> {
    json_response(StatusCode::OK, &HealthResponse { status: "ok" })
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
    pub build_time: &'static str,
    pub service: &'static str,
    /// PQC provider backing key generation and verification
    pub provider: &'static str,
    /// Negotiated algorithm for new signature keys, if any
    pub signature_algorithm: Option<String>,
    /// Negotiated KEM algorithm, if any
    pub kem_algorithm: Option<String>,
    pub store: &'static str,
    pub uptime_seconds: u64,
}

pub fn version_info(state: &AppState) -> Response<BoxBody> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "pqc-messenger",
        provider: state.provider.name(),
        signature_algorithm: state.algorithms.signature().ok().map(|a| a.to_string()),
        kem_algorithm: state.algorithms.kem().ok().map(|a| a.to_string()),
        store: state.store_name,
        uptime_seconds: state.started_at.elapsed().as_secs(),
    };

    json_response(StatusCode::OK, &response)
}
