use std::path::Path;

use axum::{routing::get, Router};
use tower_http::services::ServeDir;

pub mod ws;

pub fn router(static_dir: &Path) -> Router {
    Router::new()
        .merge(ws::router())
        .route("/healthz", get(|| async { "ok" }))
        .fallback_service(ServeDir::new(static_dir))
}
