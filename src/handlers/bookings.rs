use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, CrewAssignment, NewBooking};
use crate::services::assignment::{self, AssignmentOutcome};
use crate::services::lifecycle::{self, Expectation};
use crate::services::notifications;
use crate::state::AppState;

use super::check_auth;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let conn = state.conn()?;
        lifecycle::create_booking(&conn, body)?
    };

    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status_filter = match query.status.as_deref() {
        Some(s) => Some(
            BookingStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown booking status: {s}")))?,
        ),
        None => None,
    };
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    let bookings = {
        let conn = state.conn()?;
        queries::list_bookings(&conn, status_filter, limit)?
    };

    Ok(Json(bookings))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let conn = state.conn()?;
        queries::get_booking_by_id(&conn, &id)?
    };

    booking
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))
}

// POST /api/bookings/:id/status
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
    #[serde(flatten)]
    pub expectation: Expectation,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let change = {
        let conn = state.conn()?;
        lifecycle::transition_status(&conn, &id, body.status, &body.expectation)?
    };
    notifications::dispatch(&state, change.notifications);

    Ok(Json(change.booking))
}

// POST /api/bookings/:id/crew
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignCrewRequest {
    pub crew_ids: Vec<String>,
}

pub async fn assign_crew(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AssignCrewRequest>,
) -> Result<Json<AssignmentOutcome>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let mut outcome = {
        let conn = state.conn()?;
        assignment::assign_crew(&conn, &id, &body.crew_ids, &state.config.crew_rules())?
    };
    notifications::dispatch(&state, std::mem::take(&mut outcome.notifications));

    Ok(Json(outcome))
}

// GET /api/bookings/:id/assignments
pub async fn list_assignments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<CrewAssignment>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let assignments = {
        let conn = state.conn()?;
        if queries::get_booking_by_id(&conn, &id)?.is_none() {
            return Err(AppError::NotFound(format!("booking {id}")));
        }
        queries::list_assignments_for_booking(&conn, &id)?
    };

    Ok(Json(assignments))
}
