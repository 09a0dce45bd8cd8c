pub mod admin;
pub mod bookings;
pub mod crew;
pub mod health;
pub mod notifications;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/admin/status", get(admin::get_status))
        .route(
            "/api/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/bookings/:id/status", post(bookings::update_status))
        .route("/api/bookings/:id/crew", post(bookings::assign_crew))
        .route(
            "/api/bookings/:id/assignments",
            get(bookings::list_assignments),
        )
        .route("/api/crew", get(crew::list_crew).post(crew::create_crew))
        .route("/api/crew/:id", get(crew::get_crew))
        .route("/api/crew/:id/availability", post(crew::set_availability))
        .route("/api/crew/:id/assignments", get(crew::list_assignments))
        .route(
            "/api/assignments/:id/respond",
            post(crew::respond_assignment),
        )
        .route(
            "/api/users/:id/notifications",
            get(notifications::list_notifications),
        )
        .route(
            "/api/users/:id/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route(
            "/api/users/:id/notifications/read-all",
            post(notifications::mark_all_read),
        )
        .route(
            "/api/notifications/:id/read",
            post(notifications::mark_read),
        )
        .route(
            "/api/notifications/events",
            get(notifications::events_stream),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}
