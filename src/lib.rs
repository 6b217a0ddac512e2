//! Invoice OCR Server
//!
//! Extracts structured fields (number, date, parties, identifiers, totals
//! and line items) from uploaded PDF invoices and scanned images.
//!
//! # Modules
//!
//! - `pdf`: Text layer and rasterization via MuPDF
//! - `ocr`: Tesseract and Ollama backends
//! - `extract`: Rules, heuristics and candidate arbitration
//! - `routes`: HTTP handlers

pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod ocr;
pub mod pdf;
pub mod routes;
pub mod state;
pub mod upload;

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the HTTP application
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config().limits.max_upload_bytes;

    Router::new()
        .merge(routes::health::router())
        .merge(routes::summary::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
