//! HTTP Routes for Authentication
//!
//! - POST /api/auth/register - Create an identity, first session, optional key
//! - POST /api/auth/login    - Authenticate and get a fresh session token
//! - POST /api/auth/logout   - Revoke the presented session
//! - GET  /api/auth/me       - Profile for the presented session

use bytes::Bytes;
use hyper::header::HeaderMap;
use hyper::{Method, StatusCode};
use serde::Deserialize;

use super::{
    json_response, parse_json, parse_json_or_default, session_token, RouteResult,
    SuccessResponse,
};
use crate::server::AppState;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    /// When true the client keeps its own key and none is generated here
    #[serde(default)]
    pub generate_on_device: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub auth_token: Option<String>,
}

// =============================================================================
// Router
// =============================================================================

/// Handle `/api/auth/*`. `None` if no route matches.
pub async fn handle_auth_request(
    state: &AppState,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> Option<RouteResult> {
    let result = match (method, path) {
        (&Method::POST, "/api/auth/register") => handle_register(state, body).await,
        (&Method::POST, "/api/auth/login") => handle_login(state, body).await,
        (&Method::POST, "/api/auth/logout") => handle_logout(state, headers, body).await,
        (&Method::GET, "/api/auth/me") => handle_me(state, headers).await,
        _ => return None,
    };
    Some(result)
}

// =============================================================================
// Route Handlers
// =============================================================================

/// POST /api/auth/register
async fn handle_register(state: &AppState, body: &Bytes) -> RouteResult {
    let req: RegisterRequest = parse_json(body)?;
    let registration = state
        .identity
        .register(
            &req.email,
            &req.password,
            &req.display_name,
            req.generate_on_device,
        )
        .await?;
    Ok(json_response(StatusCode::CREATED, &registration))
}

/// POST /api/auth/login
async fn handle_login(state: &AppState, body: &Bytes) -> RouteResult {
    let req: LoginRequest = parse_json(body)?;
    let session = state.identity.login(&req.email, &req.password).await?;
    Ok(json_response(StatusCode::OK, &session))
}

/// POST /api/auth/logout
///
/// Token from the body or the bearer header; the body may be empty.
async fn handle_logout(state: &AppState, headers: &HeaderMap, body: &Bytes) -> RouteResult {
    let req: LogoutRequest = parse_json_or_default(body)?;
    state
        .identity
        .logout(session_token(headers, req.auth_token.as_deref()))
        .await?;
    Ok(json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "Logged out".to_string(),
        },
    ))
}

/// GET /api/auth/me
async fn handle_me(state: &AppState, headers: &HeaderMap) -> RouteResult {
    let profile = state.identity.me(session_token(headers, None)).await?;
    Ok(json_response(StatusCode::OK, &profile))
}
