//! Axum HTTP surface for Orderhub.
//!
//! The read API is deliberately small: one point lookup and a liveness
//! probe. All writes enter through the message feed, never through HTTP;
//! rejected and duplicate ingestions are invisible to API consumers.
//!
//! # Request Flow
//!
//! 1. `GET /order?id=<order_uid>` arrives at the handler
//! 2. The handler asks [`QueryService`](orderhub_query::QueryService) for
//!    the canonical document (cache first, store on miss)
//! 3. The document is returned verbatim as the response body, or the miss
//!    maps to `404`
//!
//! # Example
//!
//! ```no_run
//! use orderhub_cache::OrderCache;
//! use orderhub_query::QueryService;
//! use orderhub_testing::InMemoryOrderStore;
//! use orderhub_web::{router, AppState};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let query = QueryService::new(OrderCache::new(), Arc::new(InMemoryOrderStore::new()));
//! let app = router(AppState::new(query));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handlers;
pub mod state;

pub use error::AppError;
pub use state::AppState;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the service router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/order", get(handlers::order::lookup_order))
        .route("/health", get(handlers::health::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
