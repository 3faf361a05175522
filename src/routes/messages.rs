//! HTTP Routes for messages
//!
//! - POST /api/messages/send         - Verify (or sign, then verify) and store
//! - GET  /api/messages/{message_id} - Fetch as sender or recipient

use bytes::Bytes;
use hyper::header::HeaderMap;
use hyper::{Method, StatusCode};
use serde::Deserialize;

use super::{json_response, parse_json, session_token, RouteResult};
use crate::messages::OutgoingMessage;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub auth_token: Option<String>,
    pub recipient_id: String,
    pub message_body: String,
    pub public_key_id: String,
    /// base64; omit (or leave blank) to have a server-custodied key sign
    #[serde(default)]
    pub signature: Option<String>,
}

/// Handle `/api/messages/*`. `None` if no route matches.
pub async fn handle_messages_request(
    state: &AppState,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> Option<RouteResult> {
    let result = match (method, path) {
        (&Method::POST, "/api/messages/send") => handle_send(state, headers, body).await,
        (&Method::GET, p) => {
            let message_id = p.strip_prefix("/api/messages/")?;
            if message_id.is_empty() || message_id.contains('/') {
                return None;
            }
            handle_get(state, headers, message_id).await
        }
        _ => return None,
    };
    Some(result)
}

/// POST /api/messages/send
///
/// A signature that fails verification still yields 201, with
/// `signature_valid: false`.
async fn handle_send(state: &AppState, headers: &HeaderMap, body: &Bytes) -> RouteResult {
    let req: SendMessageRequest = parse_json(body)?;
    let receipt = state
        .messages
        .send(
            session_token(headers, req.auth_token.as_deref()),
            OutgoingMessage {
                recipient_id: &req.recipient_id,
                message_body: &req.message_body,
                public_key_id: &req.public_key_id,
                signature: req.signature.as_deref(),
            },
        )
        .await?;
    Ok(json_response(StatusCode::CREATED, &receipt))
}

/// GET /api/messages/{message_id}
async fn handle_get(state: &AppState, headers: &HeaderMap, message_id: &str) -> RouteResult {
    let message = state
        .messages
        .get_message(session_token(headers, None), message_id)
        .await?;
    Ok(json_response(StatusCode::OK, &message))
}
