use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    use_cases::subscription::{SubscriptionProfile, SubscriptionUseCases},
};

#[derive(Serialize)]
struct DueResponse {
    look_ahead_days: i64,
    items: Vec<SubscriptionProfile>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscriptions/due", get(list_due))
        .route("/subscriptions/{id}", get(get_subscription))
        .route("/subscriptions/{id}/activate", post(activate))
        .route("/subscriptions/{id}/cancel", post(cancel))
}

async fn list_due(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let look_ahead_days = app_state.config.renewal.look_ahead_days;
    let items = app_state
        .subscription_use_cases
        .list_due(Utc::now(), look_ahead_days)
        .await?;
    Ok(Json(DueResponse {
        look_ahead_days,
        items,
    }))
}

async fn get_subscription(
    State(use_cases): State<Arc<SubscriptionUseCases>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(use_cases.get(id).await?))
}

async fn activate(
    State(use_cases): State<Arc<SubscriptionUseCases>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(use_cases.activate(id).await?))
}

async fn cancel(
    State(use_cases): State<Arc<SubscriptionUseCases>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(use_cases.cancel(id).await?))
}
