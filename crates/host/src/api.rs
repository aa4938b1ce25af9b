//! REST API server for hueport
//!
//! Provides HTTP endpoints for health checks and direct document access.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use hueport_store::{Document, DocumentPath, DocumentStore};

// Shared state
#[derive(Clone)]
pub struct AppState {
    /// No store configured means document routes answer 404
    pub store: Option<Arc<dyn DocumentStore>>,
    pub path: DocumentPath,
    pub ws_port: u16,
}

// Routes
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/document", get(get_document).patch(merge_document))
}

// Handlers

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn get_document(State(state): State<AppState>) -> impl IntoResponse {
    let Some(store) = &state.store else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no store configured" })),
        );
    };

    match store.load(&state.path).await {
        Ok(doc) => (StatusCode::OK, Json(serde_json::json!(doc))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

async fn merge_document(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let Some(store) = &state.store else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no store configured" })),
        );
    };

    let Ok(patch) = Document::try_from(payload) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "body must be a JSON object" })),
        );
    };

    match store.merge(&state.path, patch).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "path": state.path.to_string(), "merged": true })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hueport_store::MemoryStore;

    fn state_with_store() -> AppState {
        AppState {
            store: Some(Arc::new(MemoryStore::new())),
            path: DocumentPath::new("colors", "mixer"),
            ws_port: 9310,
        }
    }

    #[tokio::test]
    async fn test_merge_then_get_round_trips() {
        let state = state_with_store();
        let store = state.store.clone().unwrap();

        let patch = Document::try_from(serde_json::json!({ "red": 120 })).unwrap();
        store.merge(&state.path, patch).await.unwrap();

        let doc = store.load(&state.path).await.unwrap();
        assert_eq!(doc.get("red"), Some(&serde_json::json!(120)));
    }

    #[tokio::test]
    async fn test_document_routes_answer_404_without_store() {
        let state = AppState {
            store: None,
            path: DocumentPath::new("colors", "mixer"),
            ws_port: 9310,
        };

        let response = get_document(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_merge_rejects_non_object_bodies() {
        let state = state_with_store();

        let response = merge_document(State(state), Json(serde_json::json!([1, 2, 3])))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
