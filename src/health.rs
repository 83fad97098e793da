//! Health check HTTP endpoint for deployment platform monitoring.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::error::{Result, WardenError};
use crate::wordlist::WordList;

#[derive(Debug, Serialize)]
struct StatusBody {
    version: &'static str,
    term_count: usize,
    term_version: u64,
}

/// Build the health check router.
pub fn router(words: Arc<WordList>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(words)
}

/// Start the health check HTTP server.
pub async fn start_health_server(port: u16, words: Arc<WordList>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(port = port, "Starting health check server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| WardenError::Io(format!("Failed to bind health check port: {}", e)))?;

    axum::serve(listener, router(words))
        .await
        .map_err(|e| WardenError::Io(format!("Health check server failed: {}", e)))
}

/// Health check handler - returns 200 OK.
async fn health_handler() -> &'static str {
    "OK"
}

async fn status_handler(State(words): State<Arc<WordList>>) -> Response {
    match words.snapshot() {
        Ok(terms) => Json(StatusBody {
            version: env!("CARGO_PKG_VERSION"),
            term_count: terms.len(),
            term_version: terms.version(),
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.user_message()).into_response(),
    }
}

/// Spawn the health check server as a background task.
pub fn spawn_health_server(port: u16, words: Arc<WordList>) {
    tokio::spawn(async move {
        if let Err(e) = start_health_server(port, words).await {
            tracing::error!(error = %e, "Health check server stopped");
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::health::{health_handler, status_handler};
    use crate::wordlist::{TermSet, WordList};
    use axum::extract::State;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn health_returns_ok() {
        assert_eq!(health_handler().await, "OK");
    }

    #[tokio::test]
    async fn status_reports_terms() {
        let words = Arc::new(WordList::new(
            "unused.txt",
            TermSet::new(4, vec!["bad".to_string(), "worse".to_string()]).expect("compile"),
        ));

        let response = status_handler(State(words)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
