use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("{0}")]
    NotFound(String),

    /// Non-success response from the commerce platform
    #[error("{operation} failed: {status} - {body}")]
    Gateway {
        operation: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response (timeout, connection reset, DNS)
    #[error("{operation} failed: {message}")]
    Transport { operation: String, message: String },

    #[error("Invalid JSON response from {operation}: {message}")]
    Parse { operation: String, message: String },

    /// The remote resource already exists. Callers recover from this locally.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment failed: {0}")]
    PaymentDeclined(String),

    /// Online payment is not usable for this store. Callers fall back to
    /// cash on delivery.
    #[error("Payment configuration: {0}")]
    Configuration(String),

    /// The subscription's claim expired and was taken over by another tick
    #[error("Renewal claim is no longer held")]
    ClaimLost,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Gateway { .. } | AppError::Transport { .. } => ErrorCode::GatewayError,
            AppError::Parse { .. } => ErrorCode::ParseError,
            AppError::Conflict(_) | AppError::ClaimLost => ErrorCode::Conflict,
            AppError::PaymentDeclined(_) => ErrorCode::PaymentDeclined,
            AppError::Configuration(_) => ErrorCode::ConfigurationError,
            AppError::InvalidInput(_) => ErrorCode::InvalidInput,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    DatabaseError,
    NotFound,
    GatewayError,
    ParseError,
    Conflict,
    PaymentDeclined,
    ConfigurationError,
    InvalidInput,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::GatewayError => "GATEWAY_ERROR",
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::PaymentDeclined => "PAYMENT_DECLINED",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
