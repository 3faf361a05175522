//! Opaque session tokens
//!
//! Tokens are 256 bits from the OS RNG, base64url encoded. They carry no
//! information about the identity, the email or the time of issue; the store
//! is the only place that can resolve them.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;

/// Random bytes per session token
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Generate a fresh, unguessable session token
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    BASE64_URL.encode(bytes)
}

/// Extract a bearer token from an Authorization header value
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tokens_are_long_and_distinct() {
        let tokens: HashSet<String> = (0..256).map(|_| generate_session_token()).collect();
        assert_eq!(tokens.len(), 256);
        for token in &tokens {
            assert_eq!(BASE64_URL.decode(token).unwrap().len(), SESSION_TOKEN_BYTES);
        }
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer abc123 "), Some("abc123"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic dXNlcjpwYXNz"), None);
    }
}
