//! Axum JSON API for LinkGuard checks.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use linkguard_core::ProviderId;
use linkguard_engine::{EngineConfig, EngineError, ResultAssembler};
use linkguard_providers::AdapterMode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;

pub const CRATE_NAME: &str = "linkguard-web";

#[derive(Clone)]
pub struct AppState {
    pub assembler: Arc<ResultAssembler>,
}

impl AppState {
    pub fn new(assembler: ResultAssembler) -> Self {
        Self {
            assembler: Arc::new(assembler),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRow {
    pub provider: ProviderId,
    pub display_name: &'static str,
    pub kind: &'static str,
    pub weight: f64,
    pub enabled: bool,
    pub mode: AdapterMode,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/providers", get(providers_handler))
        .route("/links/check", post(check_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("LINKGUARD_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let assembler = ResultAssembler::from_config(&EngineConfig::from_env())?;
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "linkguard web listening");
    axum::serve(listener, app(AppState::new(assembler))).await?;
    Ok(())
}

pub fn provider_rows(assembler: &ResultAssembler) -> Vec<ProviderRow> {
    assembler
        .engine()
        .providers()
        .iter()
        .map(|slot| {
            let mode = slot
                .adapter()
                .map(|a| a.mode())
                .unwrap_or(AdapterMode::Disabled);
            ProviderRow {
                provider: slot.provider(),
                display_name: slot.provider().display_name(),
                kind: slot.provider().kind(),
                weight: slot.weight(),
                enabled: mode != AdapterMode::Disabled,
                mode,
            }
        })
        .collect()
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({
        "status": "ok",
        "providers": state.assembler.engine().providers().len(),
    }))
    .into_response()
}

async fn providers_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({ "providers": provider_rows(&state.assembler) })).into_response()
}

async fn check_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    match state.assembler.assemble(&request.url).await {
        Ok(result) => Json(json!({ "success": true, "result": result })).into_response(),
        Err(err @ EngineError::InvalidUrl { .. }) => bad_request(err.to_string()),
    }
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": message })),
    )
        .into_response()
}
