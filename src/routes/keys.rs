//! HTTP Routes for key custody
//!
//! - POST /api/keys/generate - New server-custodied key for the caller
//! - POST /api/keys/device   - Register a device-managed public key
//! - GET  /api/keys/{key_id} - Public view of any key

use bytes::Bytes;
use hyper::header::HeaderMap;
use hyper::{Method, StatusCode};
use serde::Deserialize;

use super::{json_response, parse_json, session_token, RouteResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateKeyRequest {
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub generate_on_device: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeviceKeyRequest {
    #[serde(default)]
    pub auth_token: Option<String>,
    pub algorithm: String,
    /// base64
    pub public_key: String,
}

/// Handle `/api/keys/*`. `None` if no route matches.
pub async fn handle_keys_request(
    state: &AppState,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> Option<RouteResult> {
    let result = match (method, path) {
        (&Method::POST, "/api/keys/generate") => handle_generate(state, headers, body).await,
        (&Method::POST, "/api/keys/device") => handle_device(state, headers, body).await,
        (&Method::GET, p) => {
            let key_id = p.strip_prefix("/api/keys/")?;
            if key_id.is_empty() || key_id.contains('/') {
                return None;
            }
            handle_get(state, key_id).await
        }
        _ => return None,
    };
    Some(result)
}

/// POST /api/keys/generate
async fn handle_generate(state: &AppState, headers: &HeaderMap, body: &Bytes) -> RouteResult {
    let req: GenerateKeyRequest = parse_json(body)?;
    let key = state
        .keys
        .generate(
            session_token(headers, req.auth_token.as_deref()),
            req.generate_on_device,
        )
        .await?;
    Ok(json_response(StatusCode::CREATED, &key))
}

/// POST /api/keys/device
async fn handle_device(state: &AppState, headers: &HeaderMap, body: &Bytes) -> RouteResult {
    let req: DeviceKeyRequest = parse_json(body)?;
    let info = state
        .keys
        .register_device_key(
            session_token(headers, req.auth_token.as_deref()),
            &req.algorithm,
            &req.public_key,
        )
        .await?;
    Ok(json_response(StatusCode::CREATED, &info))
}

/// GET /api/keys/{key_id}
async fn handle_get(state: &AppState, key_id: &str) -> RouteResult {
    let info = state.keys.get_key(key_id).await?;
    Ok(json_response(StatusCode::OK, &info))
}
