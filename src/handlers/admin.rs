use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::BookingStatus;
use crate::state::AppState;

use super::check_auth;

// GET /api/admin/status
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    total_bookings: i64,
    bookings_by_status: BTreeMap<String, i64>,
    crew_by_status: BTreeMap<String, i64>,
    max_crew_per_booking: usize,
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let (booking_counts, crew_counts) = {
        let conn = state.conn()?;
        (
            queries::count_bookings_by_status(&conn)?,
            queries::count_crew_by_status(&conn)?,
        )
    };

    let mut bookings_by_status: BTreeMap<String, i64> = BookingStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    bookings_by_status.extend(booking_counts);

    Ok(Json(StatusResponse {
        total_bookings: bookings_by_status.values().sum(),
        bookings_by_status,
        crew_by_status: crew_counts.into_iter().collect(),
        max_crew_per_booking: state.config.max_crew_per_booking,
    }))
}
