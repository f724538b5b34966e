use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        tracing::error!(error = %self, "Request failed");

        let code = self.code();
        match self {
            AppError::Database(_) | AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, code, None)
            }
            AppError::NotFound(msg) => error_resp(StatusCode::NOT_FOUND, code, Some(msg)),
            AppError::InvalidInput(msg) => error_resp(StatusCode::BAD_REQUEST, code, Some(msg)),
            AppError::Conflict(msg) => error_resp(StatusCode::CONFLICT, code, Some(msg)),
            AppError::ClaimLost => {
                error_resp(StatusCode::CONFLICT, code, Some(AppError::ClaimLost.to_string()))
            }
            AppError::PaymentDeclined(msg) => {
                error_resp(StatusCode::PAYMENT_REQUIRED, code, Some(msg))
            }
            err @ (AppError::Gateway { .. }
            | AppError::Transport { .. }
            | AppError::Parse { .. }
            | AppError::Configuration(_)) => {
                error_resp(StatusCode::BAD_GATEWAY, code, Some(err.to_string()))
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
