//! API HTTP de búsqueda de workflows.
//!
//! `POST /search` devuelve los registros completos de los 5 workflows más
//! afines a la pregunta, sin filtrado adicional. `GET /` es el health
//! check. Un fallo del colaborador de embeddings se convierte en un 500
//! con cuerpo JSON en lugar de tumbar el proceso.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::{app_state::AppState, models::WorkflowRecord, rag};

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct SearchPayload {
    question: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    workflows: Vec<WorkflowRecord>,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/search", post(search_handler))
        .route("/", get(status_handler))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn search_handler(
    State(state): State<AppState>,
    Json(payload): Json<SearchPayload>,
) -> Result<Json<SearchResponse>, (StatusCode, Json<serde_json::Value>)> {
    info!("Consulta de búsqueda recibida: {}", payload.question);

    let hits = rag::retrieve_workflows(
        &state.llm_manager,
        &state.collection,
        &payload.question,
        rag::TOP_K,
    )
    .await
    .map_err(|e| {
        error!("Error al procesar la búsqueda: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Error al procesar la búsqueda: {}", e)})),
        )
    })?;

    let workflows = hits.into_iter().map(|hit| hit.record).collect();
    Ok(Json(SearchResponse { workflows }))
}

#[axum::debug_handler]
async fn status_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "AI search API is online" }))
}
