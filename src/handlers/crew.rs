use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{AssignmentStatus, CrewAssignment, CrewMember, CrewStatus, NewCrewMember};
use crate::services::assignment::{self, AssignmentResponse};
use crate::services::{crew, notifications};
use crate::state::AppState;

use super::check_auth;

// POST /api/crew
pub async fn create_crew(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewCrewMember>,
) -> Result<(StatusCode, Json<CrewMember>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let member = {
        let conn = state.conn()?;
        crew::create_crew_member(&conn, body)?
    };

    Ok((StatusCode::CREATED, Json(member)))
}

// GET /api/crew
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrewQuery {
    pub crew_status: Option<String>,
}

pub async fn list_crew(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<CrewQuery>,
) -> Result<Json<Vec<CrewMember>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status_filter = match query.crew_status.as_deref() {
        Some(s) => Some(
            CrewStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown crew status: {s}")))?,
        ),
        None => None,
    };

    let members = {
        let conn = state.conn()?;
        queries::list_crew_members(&conn, status_filter)?
    };

    Ok(Json(members))
}

// GET /api/crew/:id
pub async fn get_crew(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<CrewMember>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let member = {
        let conn = state.conn()?;
        queries::get_crew_member(&conn, &id)?
    };

    member
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("crew member {id}")))
}

// POST /api/crew/:id/availability
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub crew_status: CrewStatus,
}

pub async fn set_availability(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AvailabilityRequest>,
) -> Result<Json<CrewMember>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let member = {
        let conn = state.conn()?;
        crew::set_availability(&conn, &id, body.crew_status)?
    };

    Ok(Json(member))
}

// GET /api/crew/:id/assignments
pub async fn list_assignments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<CrewAssignment>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let assignments = {
        let conn = state.conn()?;
        if queries::get_crew_member(&conn, &id)?.is_none() {
            return Err(AppError::NotFound(format!("crew member {id}")));
        }
        queries::list_assignments_for_crew(&conn, &id)?
    };

    Ok(Json(assignments))
}

// POST /api/assignments/:id/respond
#[derive(Deserialize)]
pub struct RespondRequest {
    pub status: AssignmentStatus,
}

pub async fn respond_assignment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RespondRequest>,
) -> Result<Json<AssignmentResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let mut response = {
        let conn = state.conn()?;
        assignment::respond_assignment(&conn, &id, body.status, &state.config.admin_user_id)?
    };
    notifications::dispatch(&state, std::mem::take(&mut response.notifications));

    Ok(Json(response))
}
