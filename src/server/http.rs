//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo, one spawned task per accepted connection.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::JwtValidator;
use crate::cache::ResponseCache;
use crate::config::Args;
use crate::db::Store;
use crate::llm::Providers;
use crate::routes::{self, BoxBody};
use crate::services::{ProfileService, UnipileClient};
use crate::types::Result;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// MongoDB collections; `None` when the database was unreachable at startup
    pub store: Option<Store>,
    /// Redis response cache (bypassed when Redis is unavailable)
    pub cache: Arc<ResponseCache>,
    /// Configured AI providers
    pub providers: Providers,
    pub unipile: UnipileClient,
    /// Token signing; `None` only when no secret is configured
    pub jwt: Option<JwtValidator>,
    pub profiles: ProfileService,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, store: Option<Store>, cache: Arc<ResponseCache>, providers: Providers) -> Result<Self> {
        let timeout = Duration::from_millis(args.request_timeout_ms);
        let unipile = UnipileClient::new(&args.unipile, timeout)?;
        let jwt = match args.secret_key() {
            Some(secret) => Some(JwtValidator::new(secret, args.token_expiry_seconds)?),
            None => {
                warn!("No SECRET_KEY configured; authenticated routes will reject every request");
                None
            }
        };

        Ok(Self {
            profiles: ProfileService::new(Arc::clone(&cache)),
            args,
            store,
            cache,
            providers,
            unipile,
            jwt,
            started_at: Instant::now(),
        })
    }

    pub fn database_connected(&self) -> bool {
        self.store.is_some()
    }
}

/// Bind the configured address and serve until the process exits
pub async fn run(state: Arc<AppState>) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(state.args.listen).await?;
    info!("Listening on http://{}", state.args.listen);
    serve(listener, state).await
}

/// Accept connections from an already-bound listener
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let state = Arc::clone(&state);
                async move { handle_request(state, addr, req).await }
            });

            if let Err(e) = http1::Builder::new()
                .preserve_header_case(true)
                .title_case_headers(true)
                .serve_connection(io, service)
                .await
            {
                error!("Connection error from {}: {:?}", addr, e);
            }
        });
    }
}

/// Route a request to its handler
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    info!("[{}] {} {}", addr, method, path);

    if method == Method::OPTIONS {
        return Ok(routes::cors_preflight());
    }

    if path.starts_with("/auth/") {
        if let Some(response) = routes::handle_auth_request(req, Arc::clone(&state), &path).await {
            return Ok(response);
        }
        return Ok(routes::not_found(&path));
    }

    if path.starts_with("/api/") || path.starts_with("/social/") {
        let user = match routes::authenticate(&req, &state) {
            Ok(user) => user,
            Err(response) => return Ok(response),
        };
        return Ok(route_authenticated(req, state, user, &path).await);
    }

    let response = match (method, path.as_str()) {
        (Method::GET, "/health") => routes::health_check(&state),
        (Method::GET, "/ready") => routes::readiness_check(&state).await,
        (Method::GET, "/version") => routes::version_info(),
        _ => routes::not_found(&path),
    };
    Ok(response)
}

/// Dispatch an authenticated request to the group that owns its prefix
async fn route_authenticated(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user: routes::AuthUser,
    path: &str,
) -> Response<BoxBody> {
    let handled = if let Some(rest) = path.strip_prefix("/api/roadmap") {
        routes::handle_roadmap_request(req, state, user, rest).await
    } else if let Some(rest) = path.strip_prefix("/api/tutor/") {
        routes::handle_tutor_request(req, state, user, rest).await
    } else if let Some(rest) = path.strip_prefix("/api/coach/") {
        routes::handle_coach_request(req, state, user, rest).await
    } else if let Some(rest) = path.strip_prefix("/api/assessment/") {
        routes::handle_assessment_request(req, state, user, rest).await
    } else if let Some(rest) = path.strip_prefix("/api/linkedin/") {
        routes::handle_linkedin_request(req, state, user, rest).await
    } else if let Some(rest) = path.strip_prefix("/api/cache/") {
        routes::handle_cache_request(req, state, user, rest).await
    } else if path == "/api/profile" {
        routes::handle_profile_request(req, state, user).await
    } else if let Some(rest) = path.strip_prefix("/social/") {
        routes::handle_social_request(req, state, user, rest).await
    } else {
        None
    };

    handled.unwrap_or_else(|| routes::not_found(path))
}
