//! HTTP health endpoint.
//!
//! # Responsibilities
//! - Serve `GET /health` as JSON
//! - Answer 503 while the unit is Unhealthy
//! - Stop accepting connections when the cancellation token fires

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::health::{HealthRegistry, HealthReport, HealthStatus};

fn router(registry: Arc<HealthRegistry>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(registry)
        .layer(TraceLayer::new_for_http())
}

async fn health_handler(State(registry): State<Arc<HealthRegistry>>) -> (StatusCode, Json<HealthReport>) {
    let report = registry.check_all().await;
    let code = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (code, Json(report))
}

/// Serve health reports on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<HealthRegistry>,
    cancel: CancellationToken,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Health endpoint starting");

    axum::serve(listener, router(registry))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    tracing::info!("Health endpoint stopped");
    Ok(())
}
