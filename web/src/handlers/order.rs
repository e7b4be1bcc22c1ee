//! Point lookup of an order by `order_uid`.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

/// Query parameters for `GET /order`.
#[derive(Debug, Deserialize)]
pub struct LookupParams {
    /// The `order_uid` to look up.
    id: Option<String>,
}

/// Look up the canonical order document.
///
/// The response body is the canonical pretty-printed JSON exactly as the
/// cache holds it, with no re-serialization on the way out.
///
/// # Endpoint
///
/// ```text
/// GET /order?id=<order_uid>
/// ```
///
/// # Responses
///
/// - `200` with the canonical JSON document
/// - `400` when the `id` parameter is missing or empty
/// - `404` when the identifier is unknown
///
/// # Errors
///
/// Returns a 500 [`AppError`] if the cache missed and the store call failed.
pub async fn lookup_order(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> Result<Response, AppError> {
    let Some(id) = params.id.filter(|id| !id.is_empty()) else {
        return Err(AppError::bad_request(
            "Missing required query parameter 'id'",
        ));
    };

    let document = state
        .query
        .lookup(&id)
        .await
        .map_err(|e| AppError::internal("Order lookup failed").with_source(e.into()))?
        .ok_or_else(|| AppError::not_found("Order", &id))?;

    Ok(([(header::CONTENT_TYPE, "application/json")], document).into_response())
}
