use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::aggregator::HealthAggregator;
use crate::status::Status;

type AppState = Arc<HealthAggregator>;

pub async fn serve(aggregator: Arc<HealthAggregator>, addr: SocketAddr) -> std::io::Result<()> {
    let app = build_router(aggregator);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "health endpoint listening");
    axum::serve(listener, app.into_make_service()).await
}

pub fn build_router(aggregator: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(aggregator)
        .layer(TraceLayer::new_for_http())
}

async fn health_handler(State(aggregator): State<AppState>) -> Response {
    let report = aggregator.report();
    let code = match report.overall {
        Status::Ok | Status::Degraded => StatusCode::OK,
        Status::Error => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(report)).into_response()
}

/// Liveness never reflects component health: the process is alive as long
/// as it can answer this request.
async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

async fn readiness_handler(State(aggregator): State<AppState>) -> StatusCode {
    if aggregator.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ComponentReport;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_200_when_ok() {
        let aggregator = Arc::new(HealthAggregator::new());
        let app = build_router(aggregator);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_503_when_error() {
        let aggregator = Arc::new(HealthAggregator::new());
        aggregator.update("uploader", ComponentReport::new(Status::Error, "down"));
        let app = build_router(aggregator);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn liveness_is_always_ok() {
        let aggregator = Arc::new(HealthAggregator::new());
        aggregator.update("uploader", ComponentReport::new(Status::Error, "down"));
        let app = build_router(aggregator);
        let response = app
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_is_503_before_first_upload() {
        let aggregator = Arc::new(HealthAggregator::new());
        let app = build_router(aggregator);
        let response = app
            .oneshot(Request::builder().uri("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
