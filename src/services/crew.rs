use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{CrewMember, CrewStatus, NewCrewMember};
use crate::services::lifecycle::{next_timestamp, now_millis};

pub fn create_crew_member(conn: &Connection, new: NewCrewMember) -> Result<CrewMember, AppError> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("crew member name is required".to_string()));
    }

    let id = match new.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!(
            "CREW_{}",
            Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(8)
                .collect::<String>()
                .to_uppercase()
        ),
    };
    if queries::get_crew_member(conn, &id)?.is_some() {
        return Err(AppError::Validation(format!("crew member {id} already exists")));
    }

    let mut skills: Vec<String> = vec![];
    for skill in new.skills.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !skills.iter().any(|s| s == skill) {
            skills.push(skill.to_string());
        }
    }

    let now = now_millis();
    let member = CrewMember {
        id,
        name: name.to_string(),
        phone: new.phone,
        skills,
        crew_status: CrewStatus::Available,
        current_assignment: None,
        created_at: now,
        updated_at: now,
    };
    queries::insert_crew_member(conn, &member)?;

    tracing::info!(crew_id = %member.id, "crew member created");
    Ok(member)
}

/// Manual on/off shift toggle. `busy` is owned by the assignment workflow and can't be
/// set here, and a member who is out on a job has to be released through it first.
pub fn set_availability(
    conn: &Connection,
    crew_id: &str,
    status: CrewStatus,
) -> Result<CrewMember, AppError> {
    if status == CrewStatus::Busy {
        return Err(AppError::Validation(
            "busy is set by assigning crew to a booking".to_string(),
        ));
    }

    let mut member = queries::get_crew_member(conn, crew_id)?
        .ok_or_else(|| AppError::NotFound(format!("crew member {crew_id}")))?;

    if let Some(booking_id) = member.current_assignment.as_deref() {
        return Err(AppError::Validation(format!(
            "crew member {crew_id} is assigned to booking {booking_id}"
        )));
    }

    member.crew_status = status;
    member.updated_at = next_timestamp(&member.updated_at);
    queries::set_crew_state(conn, crew_id, status, None, &member.updated_at)?;

    tracing::info!(crew_id, crew_status = status.as_str(), "crew availability changed");
    Ok(member)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn new_member(id: Option<&str>, name: &str) -> NewCrewMember {
        NewCrewMember {
            id: id.map(str::to_string),
            name: name.to_string(),
            phone: Some("+15550002222".to_string()),
            skills: vec![
                "polish".to_string(),
                " polish ".to_string(),
                "".to_string(),
                "interior".to_string(),
            ],
        }
    }

    #[test]
    fn test_create_crew_member() {
        let conn = db::init_db(":memory:").unwrap();
        let member = create_crew_member(&conn, new_member(None, " Alex ")).unwrap();

        assert!(member.id.starts_with("CREW_"));
        assert_eq!(member.name, "Alex");
        assert_eq!(member.skills, vec!["polish".to_string(), "interior".to_string()]);
        assert_eq!(member.crew_status, CrewStatus::Available);

        let stored = queries::get_crew_member(&conn, &member.id).unwrap().unwrap();
        assert_eq!(stored.skills, member.skills);
    }

    #[test]
    fn test_duplicate_and_blank_rejected() {
        let conn = db::init_db(":memory:").unwrap();
        create_crew_member(&conn, new_member(Some("C1"), "Alex")).unwrap();
        assert!(matches!(
            create_crew_member(&conn, new_member(Some("C1"), "Blake")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            create_crew_member(&conn, new_member(Some("C2"), "  ")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_toggle_availability() {
        let conn = db::init_db(":memory:").unwrap();
        create_crew_member(&conn, new_member(Some("C1"), "Alex")).unwrap();

        let offline = set_availability(&conn, "C1", CrewStatus::Offline).unwrap();
        assert_eq!(offline.crew_status, CrewStatus::Offline);
        let back = set_availability(&conn, "C1", CrewStatus::Available).unwrap();
        assert_eq!(back.crew_status, CrewStatus::Available);

        assert!(matches!(
            set_availability(&conn, "C1", CrewStatus::Busy),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            set_availability(&conn, "C9", CrewStatus::Offline),
            Err(AppError::NotFound(_))
        ));
    }
}
