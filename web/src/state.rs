//! Application state shared across HTTP handlers.

use orderhub_query::QueryService;

/// State handed to every handler by axum.
///
/// Holds the read path only: the HTTP surface never writes. Ingestion
/// happens on the feed's task, and the cache the [`QueryService`] reads is
/// the same one the pipeline writes through.
#[derive(Clone)]
pub struct AppState {
    /// Point-lookup service combining the cache and the store.
    pub query: QueryService,
}

impl AppState {
    /// Create the application state around a query service.
    #[must_use]
    pub const fn new(query: QueryService) -> Self {
        Self { query }
    }
}
