//! Configuration for the messenger service
//!
//! CLI arguments and environment variable handling using clap.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;

use crate::pqc::{AlgorithmId, DEFAULT_KEM_CANDIDATES, DEFAULT_SIGNATURE_CANDIDATES};

/// Persistence backend
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Process-local maps; everything is lost on restart
    Memory,
    /// MongoDB collections
    Mongo,
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// PQC Messenger - identity, key custody and signed messages
#[derive(Parser, Debug, Clone)]
#[command(name = "pqc-messenger")]
#[command(about = "Identity, key custody and signed-message integrity service")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Enable development mode (random custody key, relaxed validation)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Persistence backend
    #[arg(long, env = "STORE", value_enum, default_value = "memory")]
    pub store: StoreKind,

    /// MongoDB connection URI (STORE=mongo)
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name (STORE=mongo)
    #[arg(long, env = "MONGODB_DB", default_value = "pqc_messenger")]
    pub mongodb_db: String,

    /// Ordered signature algorithm preference (comma separated)
    #[arg(long, env = "SIGNATURE_ALGORITHMS", default_value_t = DEFAULT_SIGNATURE_CANDIDATES.join(","))]
    pub signature_algorithms: String,

    /// Ordered KEM algorithm preference (comma separated)
    #[arg(long, env = "KEM_ALGORITHMS", default_value_t = DEFAULT_KEM_CANDIDATES.join(","))]
    pub kem_algorithms: String,

    /// Base64 32-byte key used to seal server-custodied private keys
    /// (required outside dev mode)
    #[arg(long, env = "CUSTODY_KEY")]
    pub custody_key: Option<String>,

    /// Session lifetime in seconds; unset means sessions never expire
    #[arg(long, env = "SESSION_TTL_SECONDS")]
    pub session_ttl_seconds: Option<u64>,

    /// Argon2id memory cost in KiB
    #[arg(long, env = "ARGON2_MEMORY_KIB", default_value = "19456")]
    pub argon2_memory_kib: u32,

    /// Argon2id iteration count
    #[arg(long, env = "ARGON2_ITERATIONS", default_value = "2")]
    pub argon2_iterations: u32,

    /// Argon2id parallelism
    #[arg(long, env = "ARGON2_PARALLELISM", default_value = "1")]
    pub argon2_parallelism: u32,

    /// Comma-separated list of CORS origins
    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        default_value = "http://localhost:8000,http://127.0.0.1:8000,http://10.0.2.2:8000,http://host.docker.internal:8000"
    )]
    pub allowed_origins: String,

    /// Maximum accepted request body size in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "65536")]
    pub max_body_bytes: usize,
}

impl Args {
    /// Parsed signature preference list
    pub fn signature_preferences(&self) -> Vec<AlgorithmId> {
        AlgorithmId::parse_list(&self.signature_algorithms)
    }

    /// Parsed KEM preference list
    pub fn kem_preferences(&self) -> Vec<AlgorithmId> {
        AlgorithmId::parse_list(&self.kem_algorithms)
    }

    /// Parsed CORS origins
    pub fn allowed_origin_list(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Decode the configured custody key, if any
    pub fn custody_key_bytes(&self) -> Result<Option<[u8; 32]>, String> {
        let Some(encoded) = self.custody_key.as_deref() else {
            return Ok(None);
        };
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| format!("CUSTODY_KEY is not valid base64: {e}"))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("CUSTODY_KEY must be 32 bytes, got {}", b.len()))?;
        Ok(Some(key))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.signature_preferences().is_empty() {
            return Err("SIGNATURE_ALGORITHMS must name at least one algorithm".to_string());
        }

        if self.kem_preferences().is_empty() {
            return Err("KEM_ALGORITHMS must name at least one algorithm".to_string());
        }

        let custody_key = self.custody_key_bytes()?;
        if !self.dev_mode && custody_key.is_none() {
            return Err("CUSTODY_KEY is required in production mode".to_string());
        }

        if self.session_ttl_seconds == Some(0) {
            return Err("SESSION_TTL_SECONDS must be positive when set".to_string());
        }

        if self.argon2_memory_kib < 8 * self.argon2_parallelism {
            return Err("ARGON2_MEMORY_KIB must be at least 8 * ARGON2_PARALLELISM".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["pqc-messenger"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_need_custody_key_outside_dev_mode() {
        let args = parse(&[]);
        assert_eq!(args.store, StoreKind::Memory);
        assert!(args.validate().is_err());

        let dev = parse(&["--dev-mode"]);
        assert!(dev.validate().is_ok());
    }

    #[test]
    fn test_default_preferences() {
        let args = parse(&[]);
        let prefs = args.signature_preferences();
        assert_eq!(prefs.first().map(AlgorithmId::as_str), Some("ML-DSA-65"));
        assert!(prefs.iter().any(|a| a.as_str() == "Dilithium3"));
        assert_eq!(args.kem_preferences().len(), 4);
    }

    #[test]
    fn test_custody_key_must_be_32_bytes() {
        let args = parse(&["--custody-key", &BASE64.encode([7u8; 16])]);
        assert!(args.validate().is_err());

        let args = parse(&["--custody-key", &BASE64.encode([7u8; 32])]);
        assert!(args.validate().is_ok());
        assert_eq!(args.custody_key_bytes().unwrap(), Some([7u8; 32]));
    }

    #[test]
    fn test_allowed_origins_split() {
        let args = parse(&["--allowed-origins", "https://a.example, https://b.example,"]);
        assert_eq!(
            args.allowed_origin_list(),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }
}
