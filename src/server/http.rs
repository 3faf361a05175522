//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one task per connection. Routing lives in
//! [`dispatch`], which is generic over the request body so it can be driven
//! without a socket.

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use hyper::body::{Body, Incoming};
use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ORIGIN,
    VARY,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::{PasswordHasher, PasswordParams};
use crate::config::{Args, StoreKind};
use crate::custodial_keys::{CustodyKey, KeyCustodyService};
use crate::db::{MemoryStore, MongoStore, SharedStore};
use crate::identity::IdentityService;
use crate::messages::MessageService;
use crate::pqc::{NegotiatedAlgorithms, PqcProvider, PqcleanProvider};
use crate::routes::{self, BoxBody};
use crate::types::{MessengerError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub identity: IdentityService,
    pub keys: Arc<KeyCustodyService>,
    pub messages: MessageService,
    pub provider: Arc<dyn PqcProvider>,
    /// Resolved once at start-up
    pub algorithms: Arc<NegotiatedAlgorithms>,
    pub store_name: &'static str,
    pub started_at: Instant,
    allowed_origins: Vec<String>,
}

impl AppState {
    /// Wire the services over an already-open store
    pub fn new(args: Args, store: SharedStore, store_name: &'static str) -> Result<Self> {
        let provider: Arc<dyn PqcProvider> = Arc::new(PqcleanProvider);
        let algorithms = Arc::new(NegotiatedAlgorithms::resolve(
            provider.as_ref(),
            &args.signature_preferences(),
            &args.kem_preferences(),
        ));

        let custody_key = match args.custody_key_bytes().map_err(MessengerError::Config)? {
            Some(bytes) => CustodyKey::from_bytes(bytes),
            None if args.dev_mode => {
                warn!("CUSTODY_KEY not set - using a random custody key; server-custodied keys will not survive a restart");
                CustodyKey::random()
            }
            None => {
                return Err(MessengerError::Config(
                    "CUSTODY_KEY is required in production mode".into(),
                ))
            }
        };

        let hasher = Arc::new(PasswordHasher::new(PasswordParams {
            memory_kib: args.argon2_memory_kib,
            iterations: args.argon2_iterations,
            parallelism: args.argon2_parallelism,
        })?);

        let keys = Arc::new(KeyCustodyService::new(
            store.clone(),
            provider.clone(),
            algorithms.clone(),
            custody_key,
        ));
        let identity = IdentityService::new(
            store.clone(),
            hasher,
            keys.clone(),
            args.session_ttl_seconds,
        );
        let messages = MessageService::new(store, keys.clone());
        let allowed_origins = args.allowed_origin_list();

        Ok(Self {
            args,
            identity,
            keys,
            messages,
            provider,
            algorithms,
            store_name,
            started_at: Instant::now(),
            allowed_origins,
        })
    }

    /// Open the configured store, then wire the services
    pub async fn from_args(args: Args) -> Result<Self> {
        let (store, store_name): (SharedStore, &'static str) = match args.store {
            StoreKind::Memory => {
                warn!("Using in-memory store - all data is lost on restart");
                (Arc::new(MemoryStore::new()), "memory")
            }
            StoreKind::Mongo => (
                Arc::new(MongoStore::connect(&args.mongodb_uri, &args.mongodb_db).await?),
                "mongo",
            ),
        };
        Self::new(args, store, store_name)
    }

    fn cors_origin(&self, headers: &HeaderMap) -> Option<HeaderValue> {
        let origin = headers.get(ORIGIN)?;
        let origin_str = origin.to_str().ok()?;
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == origin_str)
            .then(|| origin.clone())
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("PQC messenger listening on {}", state.args.listen);

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    debug!("[{}] {} {}", addr, req.method(), req.uri().path());
    Ok(dispatch(state, req).await)
}

/// Route one request and apply CORS headers
pub async fn dispatch<B>(state: Arc<AppState>, req: Request<B>) -> Response<BoxBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let cors_origin = state.cors_origin(&parts.headers);
    let is_preflight = parts.method == Method::OPTIONS;

    let mut response = route(&state, &parts.method, parts.uri.path(), &parts.headers, body).await;

    if let Some(origin) = cors_origin {
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        headers.insert(VARY, HeaderValue::from_static("Origin"));
        if is_preflight {
            headers.insert(
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, OPTIONS"),
            );
            headers.insert(
                ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type, Authorization"),
            );
            headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
        }
    }

    response
}

async fn route<B>(
    state: &AppState,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: B,
) -> Response<BoxBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match (method, path) {
        (&Method::OPTIONS, _) => return routes::empty_response(StatusCode::NO_CONTENT),
        (&Method::GET, "/api/healthz") => return routes::health_check(),
        (&Method::GET, "/api/version") => return routes::version_info(state),
        _ => {}
    }

    let body = if *method == Method::POST {
        match routes::read_body(body, state.args.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => return routes::error_response(&e),
        }
    } else {
        Bytes::new()
    };

    let handled = if path.starts_with("/api/auth/") {
        routes::handle_auth_request(state, method, path, headers, &body).await
    } else if path.starts_with("/api/keys/") {
        routes::handle_keys_request(state, method, path, headers, &body).await
    } else if path.starts_with("/api/messages/") {
        routes::handle_messages_request(state, method, path, headers, &body).await
    } else {
        None
    };

    match handled {
        Some(Ok(response)) => response,
        Some(Err(e)) => routes::error_response(&e),
        None => routes::not_found_response(path),
    }
}
