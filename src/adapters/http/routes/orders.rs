use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    use_cases::{
        subscription::{EnrollmentSelection, SubscriptionUseCases},
        verification::TransactionVerifier,
    },
};

#[derive(Deserialize)]
struct EnrollPayload {
    selections: Vec<EnrollmentSelection>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders/{order_id}/transaction", get(verify_transaction))
        .route("/orders/{order_id}/subscriptions", post(enroll))
}

async fn verify_transaction(
    State(verifier): State<Arc<TransactionVerifier>>,
    Path(order_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let verification = verifier.verify(order_id).await?;
    Ok(Json(verification))
}

async fn enroll(
    State(use_cases): State<Arc<SubscriptionUseCases>>,
    Path(order_id): Path<i64>,
    Json(payload): Json<EnrollPayload>,
) -> AppResult<impl IntoResponse> {
    let report = use_cases
        .enroll_from_order(order_id, &payload.selections)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}
