//! HTTP API.
//!
//! - `GET  /api/categories`                  configured category names
//! - `GET  /api/tracks/{category}`           index listing for a category
//! - `GET  /api/stream/{category}/{path...}` track bytes, with range support
//! - `HEAD /api/stream/{category}/{path...}` same headers, no body
//! - `POST /api/rescan`                      rebuild the index, answer when done
//! - `POST /api/evict/{id...}`               drop one cache entry
//! - `POST /api/prune`                       drop cache entries for deleted files
//!
//! Handlers only read library state. The rescan and cache maintenance
//! handlers delegate to [`Library`], which serialises them. Every route
//! answers cross-origin requests, since the player front end is hosted
//! elsewhere.
//!
//! [`client`] is the other side of the maintenance routes, used by the CLI.

pub mod client;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::library::Library;
use crate::model::CATEGORIES;
use crate::stream;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<Library>,
}

/// Build the API router over `library`.
pub fn router(library: Arc<Library>) -> Router {
    Router::new()
        .route("/api/categories", get(list_categories))
        .route("/api/tracks/{category}", get(list_tracks))
        .route(
            "/api/stream/{category}/{*path}",
            get(stream_track).head(stream_track),
        )
        .route("/api/rescan", post(rescan))
        .route("/api/evict/{*id}", post(evict))
        .route("/api/prune", post(prune))
        .layer(cors())
        .with_state(AppState { library })
}

/// Any origin may read the API. Players send `Range` and need the range
/// response headers to seek.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::POST])
        .allow_headers([header::RANGE, header::CONTENT_TYPE])
        .expose_headers([
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
            header::CONTENT_LENGTH,
        ])
}

/// Bind `bind:port` and serve until Ctrl-C.
pub async fn serve(library: Arc<Library>, bind: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((bind, port)).await?;
    info!(addr = %listener.local_addr()?, "API ready");

    axum::serve(listener, router(library))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::UnknownCategory(_) => (StatusCode::NOT_FOUND, "No such category").into_response(),
            Error::NotFound(_) => StatusCode::NOT_FOUND.into_response(),
            other => {
                error!(error = %other, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response()
            }
        }
    }
}

async fn list_categories() -> Json<&'static [&'static str]> {
    Json(&CATEGORIES)
}

async fn list_tracks(State(state): State<AppState>, Path(category): Path<String>) -> Response {
    match state.library.listing(&category) {
        Ok(tracks) => Json(&tracks[..]).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn stream_track(
    State(state): State<AppState>,
    Path((category, path)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    // Resolve everything once; a concurrent rescan cannot change this request
    let target = match state.library.resolve_stream(&category, &path) {
        Ok(target) => target,
        Err(e) => {
            debug!(category = %category, path = %path, "Stream target not found");
            return e.into_response();
        }
    };

    // A Range header that is not valid text is malformed, not absent
    let range = headers
        .get(header::RANGE)
        .map(|v| v.to_str().unwrap_or_default());

    stream::respond(&target, range, method == Method::HEAD).await
}

/// Run a library operation on its own task so a client disconnect cannot
/// cancel it half way.
async fn detached<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    match tokio::spawn(task).await {
        Ok(result) => result,
        Err(e) => Err(Error::from(e)),
    }
}

fn failure(action: &str, e: Error) -> Response {
    error!(error = %e, "{action} failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "ok": false, "error": e.to_string() })),
    )
        .into_response()
}

async fn rescan(State(state): State<AppState>) -> Response {
    info!("Rescan requested");

    let library = Arc::clone(&state.library);
    match detached(async move { library.rebuild().await }).await {
        Ok(summary) => Json(json!({
            "ok": true,
            "scannedAt": summary.scanned_at,
            "counts": summary.counts,
        }))
        .into_response(),
        Err(e) => failure("Rescan", e),
    }
}

async fn evict(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    info!(id = %id, "Eviction requested");

    let library = Arc::clone(&state.library);
    match detached(async move { library.evict(&id).await }).await {
        Ok(removed) => Json(json!({ "ok": true, "evicted": removed.is_some() })).into_response(),
        Err(e) => failure("Eviction", e),
    }
}

async fn prune(State(state): State<AppState>) -> Response {
    info!("Prune requested");

    let library = Arc::clone(&state.library);
    match detached(async move { library.prune().await }).await {
        Ok(removed) => Json(json!({ "ok": true, "removed": removed })).into_response(),
        Err(e) => failure("Prune", e),
    }
}
