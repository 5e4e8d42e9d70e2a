use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::get,
    Router,
};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::alert::AlertPayload;
use crate::error::RelayError;
use crate::relay::Relay;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    sinks: Vec<&'static str>,
}

pub fn create_router(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/webhook", get(probe).post(receive_alert))
        .route("/health", get(health))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(relay)
}

pub async fn serve(relay: Arc<Relay>, bind: &str) -> anyhow::Result<()> {
    let app = create_router(relay);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("🌐 Alert relay listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn probe() -> &'static str {
    "Webhook endpoint is up. POST alerts to this URL."
}

async fn health(State(relay): State<Arc<Relay>>) -> ResponseJson<HealthResponse> {
    ResponseJson(HealthResponse {
        status: "ok",
        sinks: relay.sink_names(),
    })
}

async fn receive_alert(
    State(relay): State<Arc<Relay>>,
    payload: Result<Json<AlertPayload>, JsonRejection>,
) -> Result<(StatusCode, &'static str), RelayError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!("Unreadable webhook body: {}", rejection.body_text());
        RelayError::InvalidPayload(rejection.body_text())
    })?;

    relay.relay(payload).await?;

    Ok((StatusCode::OK, "Alert relayed successfully"))
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            (StatusCode::BAD_REQUEST, format!("Bad request: {}", self)).into_response()
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "Error relaying alert").into_response()
        }
    }
}
