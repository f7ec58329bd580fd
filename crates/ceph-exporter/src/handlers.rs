//! HTTP request handlers: metrics exposition, landing page and liveness.

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tracing::error;

use ceph_exporter_core::export::content_type;

use crate::state::AppState;

const LANDING_PAGE: &str = r#"<html>
<head><title>Ceph Exporter</title></head>
<body>
<h1>Ceph Exporter</h1>
<p><a href="metrics">Metrics</a></p>
</body>
</html>
"#;

/// Routes of the exporter, with state applied.
pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/metrics", get(handle_metrics))
        .route("/health", get(handle_health))
        .with_state(state)
}

pub(crate) async fn handle_index() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

/// Renders the current snapshot. The walk holds the store's read lock, so it
/// runs off the async workers.
pub(crate) async fn handle_metrics(State(state): State<AppState>) -> Response {
    let exporter = state.exporter.clone();
    match tokio::task::spawn_blocking(move || exporter.render()).await {
        Ok(Ok(body)) => ([(header::CONTENT_TYPE, content_type())], body).into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            error!(error = %e, "scrape panicked in spawn_blocking");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
