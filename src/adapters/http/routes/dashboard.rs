use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use chrono::Utc;

use crate::{
    adapters::http::app_state::AppState, app_error::AppResult,
    use_cases::reporting::ReportingUseCases,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard/summary", get(summary))
        .route("/dashboard/subscriptions", get(subscriptions))
        .route("/dashboard/products", get(products))
        .route("/dashboard/accounts", get(accounts))
}

async fn summary(
    State(reporting): State<Arc<ReportingUseCases>>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(reporting.summary().await?))
}

async fn subscriptions(
    State(reporting): State<Arc<ReportingUseCases>>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(reporting.subscriptions(Utc::now()).await?))
}

async fn products(
    State(reporting): State<Arc<ReportingUseCases>>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(reporting.products().await?))
}

async fn accounts(
    State(reporting): State<Arc<ReportingUseCases>>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(reporting.accounts(Utc::now()).await?))
}
