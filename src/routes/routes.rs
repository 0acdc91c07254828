//! Defines routes for the media store.
//!
//! ## Structure
//! - `POST   /uploads`               -> multipart upload (field `file`)
//! - `DELETE /uploads/{*reference}`  -> delete an original or thumbnail
//! - `GET    /media/{*reference}`    -> serve an object (HEAD too)
//! - `GET    /healthz`, `/readyz`    -> probes
//!
//! The wildcard captures let references containing `/` or `..` reach the
//! traversal guard, which answers them with 403.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{delete_object, serve_media, upload_object},
    },
    services::storage_service::StorageService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

/// Build and return the router for all media routes.
///
/// The router carries shared state (`StorageService`) to all handlers.
pub fn routes() -> Router<StorageService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/uploads", post(upload_object))
        .route("/uploads/{*reference}", delete(delete_object))
        .route("/media/{*reference}", get(serve_media))
}

/// The complete application: routes, body ceiling, request tracing, state.
pub fn app(service: StorageService) -> Router {
    let body_limit = usize::try_from(service.max_upload_bytes()).unwrap_or(usize::MAX);

    routes()
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
