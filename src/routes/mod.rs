//! HTTP routes for the messenger API
//!
//! - `/api/auth/*`     - registration, login, logout, profile
//! - `/api/keys/*`     - key generation, device key registration, lookup
//! - `/api/messages/*` - signed message send and fetch
//! - `/api/healthz`, `/api/version`

pub mod auth_routes;
pub mod health;
pub mod keys;
pub mod messages;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderMap, HeaderValue, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, warn};

use crate::auth::extract_bearer_token;
use crate::types::MessengerError;

pub use auth_routes::handle_auth_request;
pub use health::{health_check, version_info};
pub use keys::handle_keys_request;
pub use messages::handle_messages_request;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Outcome of a route handler before it is rendered
pub type RouteResult = Result<Response<BoxBody>, MessengerError>;

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

// =============================================================================
// Response Helpers
// =============================================================================

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    let mut response = Response::new(full_body(json));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

pub fn empty_response(status: StatusCode) -> Response<BoxBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = status;
    response
}

/// Render an error as `{"error": ..., "code": ...}`
pub fn error_response(err: &MessengerError) -> Response<BoxBody> {
    if err.is_server_fault() {
        error!(code = err.code(), "Request failed: {}", err);
    } else {
        warn!(code = err.code(), "Request rejected: {}", err);
    }

    json_response(
        err.status_code(),
        &ErrorResponse {
            error: err.message().to_string(),
            code: Some(err.code().to_string()),
        },
    )
}

pub fn not_found_response(path: &str) -> Response<BoxBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &ErrorResponse {
            error: format!("No route for {}", path),
            code: Some("NOT_FOUND".to_string()),
        },
    )
}

// =============================================================================
// Request Helpers
// =============================================================================

/// Collect a request body, refusing anything over `limit` bytes
pub async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, MessengerError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Limited::new(body, limit)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                MessengerError::Http("Request body too large".into())
            } else {
                MessengerError::Http(format!("Failed to read body: {}", e))
            }
        })
}

/// Parse a JSON request body
pub fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, MessengerError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Parse a JSON request body, treating an empty body as the default value
pub fn parse_json_or_default<T: DeserializeOwned + Default>(
    bytes: &[u8],
) -> Result<T, MessengerError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_json(bytes)
}

/// Session token from the body's `auth_token`, else the bearer header
pub fn session_token<'a>(headers: &'a HeaderMap, body_token: Option<&'a str>) -> Option<&'a str> {
    body_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(extract_bearer_token)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_body_limit() {
        let ok = read_body(Full::new(Bytes::from_static(b"{}")), 16).await.unwrap();
        assert_eq!(&ok[..], b"{}");

        let err = read_body(Full::new(Bytes::from(vec![b'x'; 64])), 16)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Request body too large");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_session_token_prefers_body() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));

        assert_eq!(session_token(&headers, Some("from-body")), Some("from-body"));
        assert_eq!(session_token(&headers, Some("  ")), Some("from-header"));
        assert_eq!(session_token(&headers, None), Some("from-header"));
        assert_eq!(session_token(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_error_response_shape() {
        let response = error_response(&MessengerError::Conflict("taken".into()));
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_parse_json_or_default_accepts_empty_body() {
        #[derive(serde::Deserialize, Default)]
        struct Payload {
            #[serde(default)]
            auth_token: Option<String>,
        }
        let parsed: Payload = parse_json_or_default(b"").unwrap();
        assert!(parsed.auth_token.is_none());
        assert!(parse_json_or_default::<Payload>(b"not json").is_err());
    }
}
