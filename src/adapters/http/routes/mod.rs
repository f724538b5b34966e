pub mod dashboard;
pub mod orders;
pub mod subscriptions;

use axum::{Json, Router, response::IntoResponse, routing::get};

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(dashboard::router())
        .merge(orders::router())
        .merge(subscriptions::router())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
