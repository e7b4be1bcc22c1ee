//! Health check endpoint.
//!
//! Used by load balancers and monitoring systems to verify the process is
//! up. Dependencies are not checked here: the service refuses to start
//! without its store and subscription, so liveness is the useful signal.

use axum::http::StatusCode;

/// Simple liveness probe.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_check_is_ok() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
