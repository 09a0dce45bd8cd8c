use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::config::{BusyCrewPolicy, CrewRules};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    AssignmentStatus, Booking, BookingStatus, CrewAssignment, CrewMember, CrewStatus,
    Notification, NotificationKind,
};
use crate::services::lifecycle::next_timestamp;
use crate::services::notifications;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentOutcome {
    pub booking: Booking,
    pub assignments: Vec<CrewAssignment>,
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResponse {
    pub assignment: CrewAssignment,
    pub booking: Booking,
    #[serde(skip)]
    pub notifications: Vec<Notification>,
}

/// Attaches crew to a booking. Booking row, assignment rows, crew status and the
/// per-crew notifications are written in one transaction or not at all.
pub fn assign_crew(
    conn: &Connection,
    booking_id: &str,
    crew_ids: &[String],
    rules: &CrewRules,
) -> Result<AssignmentOutcome, AppError> {
    let mut requested: Vec<String> = Vec::with_capacity(crew_ids.len());
    for id in crew_ids.iter().map(|id| id.trim()) {
        if id.is_empty() {
            return Err(AppError::Validation("crew ids cannot be blank".to_string()));
        }
        if !requested.iter().any(|r| r == id) {
            requested.push(id.to_string());
        }
    }
    if requested.is_empty() {
        return Err(AppError::Validation("at least one crew id is required".to_string()));
    }

    let tx = conn.unchecked_transaction()?;

    let booking = queries::get_booking_by_id(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if !booking.status.accepts_crew() {
        return Err(AppError::InvalidTransition {
            entity: "booking",
            id: booking_id.to_string(),
            from: booking.status.to_string(),
            to: BookingStatus::CrewAssigned.to_string(),
        });
    }

    let additions: Vec<String> = requested
        .into_iter()
        .filter(|id| !booking.crew_ids.contains(id))
        .collect();

    let total = booking.crew_ids.len() + additions.len();
    if total > rules.max_crew_per_booking {
        return Err(AppError::CrewCapacityExceeded {
            booking_id: booking_id.to_string(),
            max: rules.max_crew_per_booking,
            requested: total,
        });
    }

    let mut members: Vec<CrewMember> = Vec::with_capacity(additions.len());
    for id in &additions {
        let member = queries::get_crew_member(&tx, id)?
            .ok_or_else(|| AppError::NotFound(format!("crew member {id}")))?;
        members.push(member);
    }

    let unavailable: Vec<&CrewMember> = members
        .iter()
        .filter(|m| !m.is_available_for(booking_id))
        .collect();

    let mut warnings = vec![];
    if !unavailable.is_empty() {
        match rules.busy_policy {
            BusyCrewPolicy::Reject => {
                return Err(AppError::CrewUnavailable(
                    unavailable.iter().map(|m| m.id.clone()).collect(),
                ));
            }
            BusyCrewPolicy::Warn => {
                for member in unavailable {
                    tracing::warn!(
                        booking_id,
                        crew_id = %member.id,
                        crew_status = member.crew_status.as_str(),
                        "assigning unavailable crew member"
                    );
                    warnings.push(match member.current_assignment.as_deref() {
                        Some(other) => format!(
                            "crew member {} is {} on booking {other}",
                            member.id,
                            member.crew_status.as_str()
                        ),
                        None => format!(
                            "crew member {} is {}",
                            member.id,
                            member.crew_status.as_str()
                        ),
                    });
                }
            }
        }
    }

    let mut updated = booking.clone();
    updated.crew_ids.extend(additions.iter().cloned());
    updated.status = BookingStatus::CrewAssigned;
    updated.version = booking.version + 1;
    updated.updated_at = next_timestamp(&booking.updated_at);

    if !queries::update_booking_guarded(&tx, &updated, booking.version)? {
        return Err(AppError::ConcurrentModification {
            entity: "booking",
            id: booking_id.to_string(),
        });
    }

    let mut assignments = Vec::with_capacity(members.len());
    let mut sent = Vec::with_capacity(members.len());
    for member in &members {
        let assignment = CrewAssignment {
            id: format!("ASG_{}", Uuid::new_v4().simple()),
            booking_id: booking_id.to_string(),
            crew_id: member.id.clone(),
            status: AssignmentStatus::Assigned,
            assigned_at: updated.updated_at,
            updated_at: updated.updated_at,
        };
        queries::insert_assignment(&tx, &assignment)?;
        queries::set_crew_state(
            &tx,
            &member.id,
            CrewStatus::Busy,
            Some(booking_id),
            &updated.updated_at,
        )?;

        sent.push(notifications::record(
            &tx,
            &member.id,
            NotificationKind::CrewAssignment,
            "New assignment",
            &format!(
                "You have been assigned to booking {booking_id}: {} on {} at {}",
                updated.service.name, updated.schedule.date, updated.schedule.time_slot
            ),
            Some(booking_id),
        )?);
        assignments.push(assignment);
    }

    tx.commit()?;

    tracing::info!(
        booking_id,
        added = assignments.len(),
        crew_total = updated.crew_ids.len(),
        warnings = warnings.len(),
        "crew assigned"
    );

    Ok(AssignmentOutcome {
        booking: updated,
        assignments,
        warnings,
        notifications: sent,
    })
}

/// Records a crew member's answer to an assignment and reconciles the booking and the
/// crew member's own status in the same transaction.
pub fn respond_assignment(
    conn: &Connection,
    assignment_id: &str,
    target: AssignmentStatus,
    admin_user_id: &str,
) -> Result<AssignmentResponse, AppError> {
    if target == AssignmentStatus::Assigned {
        return Err(AppError::Validation(
            "an assignment cannot be answered with `assigned`".to_string(),
        ));
    }

    let tx = conn.unchecked_transaction()?;

    let current = queries::get_assignment(&tx, assignment_id)?
        .ok_or_else(|| AppError::NotFound(format!("assignment {assignment_id}")))?;
    let booking = queries::get_booking_by_id(&tx, &current.booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {}", current.booking_id)))?;

    // Answers on a closed booking would rewrite its crew after the fact
    if booking.status.is_terminal() && current.status != target {
        return Err(AppError::InvalidTransition {
            entity: "booking",
            id: booking.id.clone(),
            from: booking.status.to_string(),
            to: format!("assignment {}", target.as_str()),
        });
    }
    if !current.status.can_move_to(target) {
        return Err(AppError::InvalidTransition {
            entity: "assignment",
            id: assignment_id.to_string(),
            from: current.status.as_str().to_string(),
            to: target.as_str().to_string(),
        });
    }
    if current.status == target {
        return Ok(AssignmentResponse {
            assignment: current,
            booking,
            notifications: vec![],
        });
    }

    let now = next_timestamp(&current.updated_at);
    queries::update_assignment_status(&tx, assignment_id, target, &now)?;

    let member = queries::get_crew_member(&tx, &current.crew_id)?;
    let holds_booking = member
        .as_ref()
        .is_some_and(|m| m.current_assignment.as_deref() == Some(booking.id.as_str()));

    let mut updated_booking = booking.clone();
    match target {
        AssignmentStatus::Rejected => {
            updated_booking.crew_ids.retain(|id| id != &current.crew_id);
            // Nobody left to send out: the booking waits for a new crew
            if updated_booking.status.requires_crew() && updated_booking.crew_ids.is_empty() {
                tracing::info!(
                    booking_id = %booking.id,
                    from = %booking.status,
                    "last crew member rejected, booking back to confirmed"
                );
                updated_booking.status = BookingStatus::Confirmed;
            }
            updated_booking.version = booking.version + 1;
            updated_booking.updated_at = next_timestamp(&booking.updated_at);
            if !queries::update_booking_guarded(&tx, &updated_booking, booking.version)? {
                return Err(AppError::ConcurrentModification {
                    entity: "booking",
                    id: booking.id.clone(),
                });
            }
            if holds_booking {
                queries::set_crew_state(&tx, &current.crew_id, CrewStatus::Available, None, &now)?;
            }
        }
        AssignmentStatus::Completed => {
            if holds_booking {
                queries::set_crew_state(&tx, &current.crew_id, CrewStatus::Available, None, &now)?;
            }
        }
        AssignmentStatus::Accepted | AssignmentStatus::Assigned => {}
    }

    let crew_name = member
        .as_ref()
        .map(|m| m.name.as_str())
        .unwrap_or(current.crew_id.as_str());
    let notification = notifications::record(
        &tx,
        admin_user_id,
        NotificationKind::AssignmentResponse,
        "Assignment update",
        &format!(
            "{crew_name} {} booking {}",
            target.as_str(),
            booking.id
        ),
        Some(booking.id.as_str()),
    )?;

    tx.commit()?;

    tracing::info!(
        assignment_id,
        booking_id = %booking.id,
        crew_id = %current.crew_id,
        from = current.status.as_str(),
        to = target.as_str(),
        "assignment answered"
    );

    let mut assignment = current;
    assignment.status = target;
    assignment.updated_at = now;

    Ok(AssignmentResponse {
        assignment,
        booking: updated_booking,
        notifications: vec![notification],
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::db;
    use crate::models::{
        CustomerRef, NewBooking, NewCrewMember, PaymentMethod, Schedule, ServiceDescriptor,
    };
    use crate::services::crew::{create_crew_member, set_availability};
    use crate::services::lifecycle::{create_booking, transition_status, Expectation};

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn rules(max: usize, policy: BusyCrewPolicy) -> CrewRules {
        CrewRules {
            max_crew_per_booking: max,
            busy_policy: policy,
        }
    }

    fn add_booking(conn: &Connection, id: &str, status: BookingStatus) {
        create_booking(
            conn,
            NewBooking {
                id: Some(id.to_string()),
                customer: CustomerRef {
                    user_id: Some("U1".to_string()),
                    ..Default::default()
                },
                service: ServiceDescriptor {
                    name: "Interior clean".to_string(),
                    duration_minutes: 60,
                },
                vehicle: Default::default(),
                schedule: Schedule {
                    date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
                    time_slot: "14:00".to_string(),
                    branch: Some("central".to_string()),
                },
                price: 30.0,
                payment_method: PaymentMethod::Cash,
                status: Some(status),
                notes: None,
            },
        )
        .unwrap();
    }

    fn add_crew(conn: &Connection, id: &str) {
        create_crew_member(
            conn,
            NewCrewMember {
                id: Some(id.to_string()),
                name: format!("Crew {id}"),
                phone: None,
                skills: vec!["wash".to_string()],
            },
        )
        .unwrap();
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_assigning_two_crew_notifies_each() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_100", BookingStatus::Confirmed);
        add_crew(&conn, "C1");
        add_crew(&conn, "C2");

        let outcome = assign_crew(
            &conn,
            "BOOK_100",
            &ids(&["C1", "C2"]),
            &rules(4, BusyCrewPolicy::Reject),
        )
        .unwrap();

        assert_eq!(outcome.booking.status, BookingStatus::CrewAssigned);
        assert_eq!(outcome.booking.crew_ids, ids(&["C1", "C2"]));
        assert_eq!(outcome.assignments.len(), 2);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.notifications.len(), 2);

        for crew_id in ["C1", "C2"] {
            let inbox = queries::list_notifications(&conn, crew_id, false, 10).unwrap();
            assert_eq!(inbox.len(), 1, "{crew_id}");
            assert_eq!(inbox[0].booking_id.as_deref(), Some("BOOK_100"));
            assert_eq!(inbox[0].kind, NotificationKind::CrewAssignment);

            let member = queries::get_crew_member(&conn, crew_id).unwrap().unwrap();
            assert_eq!(member.crew_status, CrewStatus::Busy);
            assert_eq!(member.current_assignment.as_deref(), Some("BOOK_100"));
        }

        let stored = queries::get_booking_by_id(&conn, "BOOK_100").unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::CrewAssigned);
        assert_eq!(stored.version, 2);
    }

    #[test]
    fn test_capacity_is_enforced_without_partial_writes() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        for id in ["C1", "C2", "C3"] {
            add_crew(&conn, id);
        }

        assign_crew(&conn, "BOOK_1", &ids(&["C1", "C2"]), &rules(2, BusyCrewPolicy::Reject))
            .unwrap();
        let err = assign_crew(&conn, "BOOK_1", &ids(&["C3"]), &rules(2, BusyCrewPolicy::Reject))
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::CrewCapacityExceeded {
                max: 2,
                requested: 3,
                ..
            }
        ));

        let stored = queries::get_booking_by_id(&conn, "BOOK_1").unwrap().unwrap();
        assert_eq!(stored.crew_ids, ids(&["C1", "C2"]));
        let c3 = queries::get_crew_member(&conn, "C3").unwrap().unwrap();
        assert_eq!(c3.crew_status, CrewStatus::Available);
        assert!(queries::list_notifications(&conn, "C3", false, 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_reassigning_same_crew_is_not_double_counted() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        add_crew(&conn, "C1");

        assign_crew(&conn, "BOOK_1", &ids(&["C1", "C1"]), &rules(1, BusyCrewPolicy::Reject))
            .unwrap();
        let again =
            assign_crew(&conn, "BOOK_1", &ids(&["C1"]), &rules(1, BusyCrewPolicy::Reject))
                .unwrap();
        assert!(again.assignments.is_empty());
        assert_eq!(again.booking.crew_ids, ids(&["C1"]));
        assert_eq!(
            queries::list_assignments_for_booking(&conn, "BOOK_1")
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_busy_crew_rejected_by_default() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        add_booking(&conn, "BOOK_2", BookingStatus::Confirmed);
        add_crew(&conn, "C1");
        add_crew(&conn, "C2");

        assign_crew(&conn, "BOOK_1", &ids(&["C1"]), &rules(4, BusyCrewPolicy::Reject)).unwrap();
        let err = assign_crew(
            &conn,
            "BOOK_2",
            &ids(&["C1", "C2"]),
            &rules(4, BusyCrewPolicy::Reject),
        )
        .unwrap_err();
        match err {
            AppError::CrewUnavailable(ids) => assert_eq!(ids, vec!["C1".to_string()]),
            other => panic!("unexpected error: {other}"),
        }

        let stored = queries::get_booking_by_id(&conn, "BOOK_2").unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert!(stored.crew_ids.is_empty());
    }

    #[test]
    fn test_busy_crew_warned_when_configured() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        add_booking(&conn, "BOOK_2", BookingStatus::Confirmed);
        add_crew(&conn, "C1");
        add_crew(&conn, "C2");
        set_availability(&conn, "C2", CrewStatus::Offline).unwrap();

        assign_crew(&conn, "BOOK_1", &ids(&["C1"]), &rules(4, BusyCrewPolicy::Warn)).unwrap();
        let outcome = assign_crew(
            &conn,
            "BOOK_2",
            &ids(&["C1", "C2"]),
            &rules(4, BusyCrewPolicy::Warn),
        )
        .unwrap();

        assert_eq!(outcome.warnings.len(), 2);
        assert!(outcome.warnings[0].contains("BOOK_1"));
        assert!(outcome.warnings[1].contains("offline"));
        assert_eq!(outcome.booking.status, BookingStatus::CrewAssigned);
    }

    #[test]
    fn test_unknown_crew_is_not_found() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        let err = assign_crew(&conn, "BOOK_1", &ids(&["GHOST"]), &rules(4, BusyCrewPolicy::Reject))
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_cannot_assign_once_underway() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        add_crew(&conn, "C1");
        add_crew(&conn, "C2");
        assign_crew(&conn, "BOOK_1", &ids(&["C1"]), &rules(4, BusyCrewPolicy::Reject)).unwrap();
        transition_status(&conn, "BOOK_1", BookingStatus::CrewGoing, &Expectation::default())
            .unwrap();

        let err = assign_crew(&conn, "BOOK_1", &ids(&["C2"]), &rules(4, BusyCrewPolicy::Reject))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn test_empty_request_rejected() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        let err =
            assign_crew(&conn, "BOOK_1", &[], &rules(4, BusyCrewPolicy::Reject)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_completion_frees_crew_and_closes_assignments() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        add_crew(&conn, "C1");
        assign_crew(&conn, "BOOK_1", &ids(&["C1"]), &rules(4, BusyCrewPolicy::Reject)).unwrap();

        transition_status(&conn, "BOOK_1", BookingStatus::Washing, &Expectation::default())
            .unwrap();
        transition_status(&conn, "BOOK_1", BookingStatus::Completed, &Expectation::default())
            .unwrap();

        let member = queries::get_crew_member(&conn, "C1").unwrap().unwrap();
        assert_eq!(member.crew_status, CrewStatus::Available);
        assert!(member.current_assignment.is_none());

        let assignments = queries::list_assignments_for_booking(&conn, "BOOK_1").unwrap();
        assert_eq!(assignments[0].status, AssignmentStatus::Completed);
    }

    #[test]
    fn test_cancellation_frees_crew() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        add_crew(&conn, "C1");
        assign_crew(&conn, "BOOK_1", &ids(&["C1"]), &rules(4, BusyCrewPolicy::Reject)).unwrap();
        transition_status(&conn, "BOOK_1", BookingStatus::Cancelled, &Expectation::default())
            .unwrap();

        let member = queries::get_crew_member(&conn, "C1").unwrap().unwrap();
        assert_eq!(member.crew_status, CrewStatus::Available);
    }

    #[test]
    fn test_rejection_removes_crew_and_reverts_booking() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        add_crew(&conn, "C1");
        let outcome =
            assign_crew(&conn, "BOOK_1", &ids(&["C1"]), &rules(4, BusyCrewPolicy::Reject))
                .unwrap();
        let assignment_id = outcome.assignments[0].id.clone();

        let response =
            respond_assignment(&conn, &assignment_id, AssignmentStatus::Rejected, "admin")
                .unwrap();
        assert_eq!(response.assignment.status, AssignmentStatus::Rejected);
        assert!(response.booking.crew_ids.is_empty());
        assert_eq!(response.booking.status, BookingStatus::Confirmed);
        assert_eq!(response.notifications.len(), 1);
        assert_eq!(response.notifications[0].user_id, "admin");

        let member = queries::get_crew_member(&conn, "C1").unwrap().unwrap();
        assert_eq!(member.crew_status, CrewStatus::Available);

        let err = respond_assignment(&conn, &assignment_id, AssignmentStatus::Accepted, "admin")
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn test_rejecting_last_crew_underway_returns_booking_to_confirmed() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        add_crew(&conn, "C1");
        let outcome =
            assign_crew(&conn, "BOOK_1", &ids(&["C1"]), &rules(4, BusyCrewPolicy::Reject))
                .unwrap();
        transition_status(&conn, "BOOK_1", BookingStatus::CrewGoing, &Expectation::default())
            .unwrap();

        let response = respond_assignment(
            &conn,
            &outcome.assignments[0].id,
            AssignmentStatus::Rejected,
            "admin",
        )
        .unwrap();
        assert_eq!(response.booking.status, BookingStatus::Confirmed);
        assert!(response.booking.crew_ids.is_empty());

        let stored = queries::get_booking_by_id(&conn, "BOOK_1").unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
        let member = queries::get_crew_member(&conn, "C1").unwrap().unwrap();
        assert_eq!(member.crew_status, CrewStatus::Available);

        // The booking can be staffed again
        add_crew(&conn, "C2");
        let again =
            assign_crew(&conn, "BOOK_1", &ids(&["C2"]), &rules(4, BusyCrewPolicy::Reject))
                .unwrap();
        assert_eq!(again.booking.status, BookingStatus::CrewAssigned);
    }

    #[test]
    fn test_rejecting_one_of_two_crew_underway_keeps_stage() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        add_crew(&conn, "C1");
        add_crew(&conn, "C2");
        let outcome = assign_crew(
            &conn,
            "BOOK_1",
            &ids(&["C1", "C2"]),
            &rules(4, BusyCrewPolicy::Reject),
        )
        .unwrap();
        transition_status(&conn, "BOOK_1", BookingStatus::CrewArrived, &Expectation::default())
            .unwrap();

        let response = respond_assignment(
            &conn,
            &outcome.assignments[0].id,
            AssignmentStatus::Rejected,
            "admin",
        )
        .unwrap();
        assert_eq!(response.booking.status, BookingStatus::CrewArrived);
        assert_eq!(response.booking.crew_ids, vec!["C2".to_string()]);
    }

    #[test]
    fn test_cancellation_closes_open_assignments() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        add_crew(&conn, "C1");
        let outcome =
            assign_crew(&conn, "BOOK_1", &ids(&["C1"]), &rules(4, BusyCrewPolicy::Reject))
                .unwrap();
        let assignment_id = outcome.assignments[0].id.clone();
        let cancelled =
            transition_status(&conn, "BOOK_1", BookingStatus::Cancelled, &Expectation::default())
                .unwrap();

        let stored = queries::get_assignment(&conn, &assignment_id).unwrap().unwrap();
        assert_eq!(stored.status, AssignmentStatus::Rejected);

        let err = respond_assignment(&conn, &assignment_id, AssignmentStatus::Accepted, "admin")
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        let err = respond_assignment(&conn, &assignment_id, AssignmentStatus::Completed, "admin")
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        // Repeating the recorded answer changes nothing
        let repeat =
            respond_assignment(&conn, &assignment_id, AssignmentStatus::Rejected, "admin")
                .unwrap();
        assert!(repeat.notifications.is_empty());

        let booking = queries::get_booking_by_id(&conn, "BOOK_1").unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.version, cancelled.booking.version);
        assert_eq!(booking.crew_ids, vec!["C1".to_string()]);
        assert_eq!(queries::count_unread(&conn, "admin").unwrap(), 0);
    }

    #[test]
    fn test_accepted_assignment_on_paid_booking_is_closed() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        add_crew(&conn, "C1");
        let outcome =
            assign_crew(&conn, "BOOK_1", &ids(&["C1"]), &rules(4, BusyCrewPolicy::Reject))
                .unwrap();
        let assignment_id = outcome.assignments[0].id.clone();
        respond_assignment(&conn, &assignment_id, AssignmentStatus::Accepted, "admin").unwrap();
        for status in [BookingStatus::Washing, BookingStatus::Completed, BookingStatus::Paid] {
            transition_status(&conn, "BOOK_1", status, &Expectation::default()).unwrap();
        }

        let err = respond_assignment(&conn, &assignment_id, AssignmentStatus::Rejected, "admin")
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        let stored = queries::get_assignment(&conn, &assignment_id).unwrap().unwrap();
        assert_eq!(stored.status, AssignmentStatus::Completed);
    }

    #[test]
    fn test_acceptance_keeps_crew_busy() {
        let conn = setup_db();
        add_booking(&conn, "BOOK_1", BookingStatus::Confirmed);
        add_crew(&conn, "C1");
        let outcome =
            assign_crew(&conn, "BOOK_1", &ids(&["C1"]), &rules(4, BusyCrewPolicy::Reject))
                .unwrap();
        let assignment_id = outcome.assignments[0].id.clone();

        let first =
            respond_assignment(&conn, &assignment_id, AssignmentStatus::Accepted, "admin")
                .unwrap();
        assert_eq!(first.notifications.len(), 1);
        let repeat =
            respond_assignment(&conn, &assignment_id, AssignmentStatus::Accepted, "admin")
                .unwrap();
        assert!(repeat.notifications.is_empty());

        let member = queries::get_crew_member(&conn, "C1").unwrap().unwrap();
        assert_eq!(member.crew_status, CrewStatus::Busy);
        let stored = queries::get_assignment(&conn, &assignment_id).unwrap().unwrap();
        assert_eq!(stored.status, AssignmentStatus::Accepted);
    }
}
