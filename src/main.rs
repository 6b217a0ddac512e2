//! Invoice OCR Server
//!
//! HTTP service extracting invoice fields from PDFs and scans.

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invoice_ocr_server::config::Config;
use invoice_ocr_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may carry RUST_LOG, so load it first
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "invoice_ocr_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Invoice OCR Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "OCR: lang={} dpi={} max_pages={}",
        config.ocr.language,
        config.ocr.dpi,
        config.ocr.max_pages
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config);

    let providers = state.ocr().available_providers().await;
    if providers.is_empty() {
        tracing::warn!("No OCR provider available; scanned documents will not be read");
    } else {
        tracing::info!("OCR providers available: {:?}", providers);
    }

    let app = invoice_ocr_server::app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Invoice OCR Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
