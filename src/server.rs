//! Local HTTP API over the request/response protocol.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api` | Dispatch a [`Request`] and return its [`Response`] |
//! | `GET`  | `/products` | Product list; `filter` and `sort` query parameters |
//! | `GET`  | `/export.csv` | CSV export of the same view |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Failed requests answer with `success: false` and a message. Storage
//! failures use status 500, everything else in the protocol is 200.
//!
//! All origins are allowed so a browser page or extension can call it.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response as HttpResponse},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::compare::ViewOptions;
use crate::export;
use crate::protocol::{Request, Response, Service};

/// Build the router. Exposed for embedding and tests.
pub fn router(service: Arc<Service>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api", post(handle_api))
        .route("/products", get(handle_products))
        .route("/export.csv", get(handle_export))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(service)
}

/// Serve until the process is terminated.
pub async fn run_server(bind: &str, service: Arc<Service>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("pcmp server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

async fn handle_api(
    State(service): State<Arc<Service>>,
    Json(request): Json<Request>,
) -> Json<Response> {
    Json(service.handle(request).await)
}

async fn handle_products(
    State(service): State<Arc<Service>>,
    Query(view): Query<ViewOptions>,
) -> (StatusCode, Json<Response>) {
    let response = service.handle(Request::GetProducts { view }).await;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response))
}

async fn handle_export(
    State(service): State<Arc<Service>>,
    Query(view): Query<ViewOptions>,
) -> HttpResponse {
    let products = match service.products(&view).await {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Response::failure(e.to_string())),
            )
                .into_response()
        }
    };

    match export::to_csv_string(&products) {
        Ok(csv) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export::DEFAULT_FILE_NAME),
                ),
            ],
            csv,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Response::failure(e.to_string())),
        )
            .into_response(),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
