use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::tracing::request_id_middleware;
use crate::discovery::DiscoveryClient;

/// Peer called by `GET /`.
#[derive(Clone)]
pub struct Downstream {
    pub client: DiscoveryClient,
    pub peer: String,
}

/// State shared by the node's HTTP handlers.
pub struct GatewayState {
    hostname: String,
    downstream: Option<Downstream>,
}

impl GatewayState {
    /// State for a node that answers `GET /` itself.
    pub fn leaf(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            downstream: None,
        }
    }

    /// State for a node that proxies `GET /` to `downstream`.
    pub fn with_downstream(hostname: impl Into<String>, downstream: Downstream) -> Self {
        Self {
            hostname: hostname.into(),
            downstream: Some(downstream),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }
}

/// Build the node's router.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/healthcheck", get(healthcheck_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http()),
        )
}

/// Liveness probe polled by the registry. Independent of the TTL verdict.
async fn healthcheck_handler() -> &'static str {
    "OK"
}

async fn root_handler(State(state): State<Arc<GatewayState>>) -> Response {
    let Some(downstream) = &state.downstream else {
        return (StatusCode::OK, format!("OK - from {}", state.hostname)).into_response();
    };

    match downstream.client.call(&downstream.peer).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::warn!(peer = %downstream.peer, step = %e.step(), "Downstream call failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("NOK - {}; from {}, err: {}", e.step(), state.hostname, e),
            )
                .into_response()
        }
    }
}
