use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{entity} {id} was modified concurrently; reload and retry")]
    ConcurrentModification { entity: &'static str, id: String },

    #[error("cannot move {entity} {id} from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },

    #[error("booking {booking_id} allows at most {max} crew members, {requested} requested")]
    CrewCapacityExceeded {
        booking_id: String,
        max: usize,
        requested: usize,
    },

    #[error("crew unavailable: {}", .0.join(", "))]
    CrewUnavailable(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("downstream unavailable: {0}")]
    DownstreamUnavailable(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Storage(_) => "storage",
            AppError::NotFound(_) => "not_found",
            AppError::ConcurrentModification { .. } => "concurrent_modification",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::CrewCapacityExceeded { .. } => "crew_capacity_exceeded",
            AppError::CrewUnavailable(_) => "crew_unavailable",
            AppError::Validation(_) => "validation_failure",
            AppError::DownstreamUnavailable(_) => "downstream_unavailable",
            AppError::Unauthorized => "unauthorized",
        }
    }

    /// Only outbound deliveries are retried. A conflict means the caller's view is stale,
    /// so it is handed back instead of replayed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::DownstreamUnavailable(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ConcurrentModification { .. } => StatusCode::CONFLICT,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::CrewCapacityExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::CrewUnavailable(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DownstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string(), "kind": self.kind() });
        (status, axum::Json(body)).into_response()
    }
}
