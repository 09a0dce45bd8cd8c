use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};

use crate::models::{
    AssignmentStatus, Booking, BookingStatus, CrewAssignment, CrewMember, CrewStatus,
    Notification, NotificationKind, PaymentMethod, PaymentStatus, Schedule,
};

const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid stored timestamp: {s}"))?;
    Ok(parsed.with_timezone(&Utc))
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, customer, service, vehicle, schedule_date, schedule_time_slot, \
     schedule_branch, price, payment_method, payment_status, status, crew_ids, notes, version, \
     created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let customer = serde_json::to_string(&booking.customer)?;
    let service = serde_json::to_string(&booking.service)?;
    let vehicle = serde_json::to_string(&booking.vehicle)?;
    let crew_ids = serde_json::to_string(&booking.crew_ids)?;

    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            booking.id,
            customer,
            service,
            vehicle,
            booking.schedule.date.format("%Y-%m-%d").to_string(),
            booking.schedule.time_slot,
            booking.schedule.branch,
            booking.price,
            booking.payment_method.as_str(),
            booking.payment_status.as_str(),
            booking.status.as_str(),
            crew_ids,
            booking.notes,
            booking.version,
            format_ts(&booking.created_at),
            format_ts(&booking.updated_at),
        ],
    )
    .with_context(|| format!("failed to insert booking {}", booking.id))?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_bookings(
    conn: &Connection,
    status_filter: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ?1 \
                 ORDER BY schedule_date DESC, schedule_time_slot DESC LIMIT ?2"
            ),
            vec![
                Box::new(status.as_str()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings \
                 ORDER BY schedule_date DESC, schedule_time_slot DESC LIMIT ?1"
            ),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Writes the mutable fields of `booking` only if the stored row is still at
/// `expected_version`. Returns `false` when the guard did not match.
pub fn update_booking_guarded(
    conn: &Connection,
    booking: &Booking,
    expected_version: i64,
) -> anyhow::Result<bool> {
    let crew_ids = serde_json::to_string(&booking.crew_ids)?;
    let count = conn.execute(
        "UPDATE bookings
         SET status = ?1, crew_ids = ?2, payment_status = ?3, version = ?4, updated_at = ?5
         WHERE id = ?6 AND version = ?7",
        params![
            booking.status.as_str(),
            crew_ids,
            booking.payment_status.as_str(),
            booking.version,
            format_ts(&booking.updated_at),
            booking.id,
            expected_version,
        ],
    )?;
    Ok(count > 0)
}

pub fn count_bookings_by_status(conn: &Connection) -> anyhow::Result<Vec<(String, i64)>> {
    let mut stmt =
        conn.prepare("SELECT status, COUNT(*) FROM bookings GROUP BY status ORDER BY status")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut counts = vec![];
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}

fn parse_booking_row(row: &Row<'_>) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let customer_json: String = row.get(1)?;
    let service_json: String = row.get(2)?;
    let vehicle_json: String = row.get(3)?;
    let date_str: String = row.get(4)?;
    let payment_method_str: String = row.get(8)?;
    let payment_status_str: String = row.get(9)?;
    let status_str: String = row.get(10)?;
    let crew_ids_json: String = row.get(11)?;
    let created_at_str: String = row.get(14)?;
    let updated_at_str: String = row.get(15)?;

    Ok(Booking {
        customer: serde_json::from_str(&customer_json)
            .with_context(|| format!("booking {id}: invalid customer"))?,
        service: serde_json::from_str(&service_json)
            .with_context(|| format!("booking {id}: invalid service"))?,
        vehicle: serde_json::from_str(&vehicle_json)
            .with_context(|| format!("booking {id}: invalid vehicle"))?,
        schedule: Schedule {
            date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                .with_context(|| format!("booking {id}: invalid date {date_str}"))?,
            time_slot: row.get(5)?,
            branch: row.get(6)?,
        },
        price: row.get(7)?,
        payment_method: PaymentMethod::parse(&payment_method_str)
            .with_context(|| format!("booking {id}: unknown payment method {payment_method_str}"))?,
        payment_status: PaymentStatus::parse(&payment_status_str)
            .with_context(|| format!("booking {id}: unknown payment status {payment_status_str}"))?,
        status: BookingStatus::parse(&status_str)
            .with_context(|| format!("booking {id}: unknown status {status_str}"))?,
        crew_ids: serde_json::from_str(&crew_ids_json)
            .with_context(|| format!("booking {id}: invalid crew ids"))?,
        notes: row.get(12)?,
        version: row.get(13)?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
        id,
    })
}

// ── Crew ──

const CREW_COLUMNS: &str =
    "id, name, phone, skills, crew_status, current_assignment, created_at, updated_at";

pub fn insert_crew_member(conn: &Connection, member: &CrewMember) -> anyhow::Result<()> {
    let skills = serde_json::to_string(&member.skills)?;
    conn.execute(
        &format!("INSERT INTO crew_members ({CREW_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            member.id,
            member.name,
            member.phone,
            skills,
            member.crew_status.as_str(),
            member.current_assignment,
            format_ts(&member.created_at),
            format_ts(&member.updated_at),
        ],
    )
    .with_context(|| format!("failed to insert crew member {}", member.id))?;
    Ok(())
}

pub fn get_crew_member(conn: &Connection, id: &str) -> anyhow::Result<Option<CrewMember>> {
    let result = conn.query_row(
        &format!("SELECT {CREW_COLUMNS} FROM crew_members WHERE id = ?1"),
        params![id],
        |row| Ok(parse_crew_row(row)),
    );

    match result {
        Ok(member) => Ok(Some(member?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_crew_members(
    conn: &Connection,
    status_filter: Option<CrewStatus>,
) -> anyhow::Result<Vec<CrewMember>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CREW_COLUMNS} FROM crew_members
         WHERE ?1 IS NULL OR crew_status = ?1
         ORDER BY name ASC"
    ))?;
    let rows = stmt.query_map(params![status_filter.map(|s| s.as_str())], |row| {
        Ok(parse_crew_row(row))
    })?;

    let mut members = vec![];
    for row in rows {
        members.push(row??);
    }
    Ok(members)
}

pub fn set_crew_state(
    conn: &Connection,
    id: &str,
    status: CrewStatus,
    current_assignment: Option<&str>,
    updated_at: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE crew_members SET crew_status = ?1, current_assignment = ?2, updated_at = ?3
         WHERE id = ?4",
        params![status.as_str(), current_assignment, format_ts(updated_at), id],
    )?;
    Ok(count > 0)
}

/// Frees every crew member whose current assignment is `booking_id`.
pub fn release_crew_for_booking(
    conn: &Connection,
    booking_id: &str,
    updated_at: &DateTime<Utc>,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE crew_members SET crew_status = 'available', current_assignment = NULL, updated_at = ?2
         WHERE current_assignment = ?1",
        params![booking_id, format_ts(updated_at)],
    )?;
    Ok(count)
}

pub fn count_crew_by_status(conn: &Connection) -> anyhow::Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT crew_status, COUNT(*) FROM crew_members GROUP BY crew_status ORDER BY crew_status",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut counts = vec![];
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}

fn parse_crew_row(row: &Row<'_>) -> anyhow::Result<CrewMember> {
    let id: String = row.get(0)?;
    let skills_json: String = row.get(3)?;
    let status_str: String = row.get(4)?;
    let created_at_str: String = row.get(6)?;
    let updated_at_str: String = row.get(7)?;

    Ok(CrewMember {
        name: row.get(1)?,
        phone: row.get(2)?,
        skills: serde_json::from_str(&skills_json)
            .with_context(|| format!("crew member {id}: invalid skills"))?,
        crew_status: CrewStatus::parse(&status_str)
            .with_context(|| format!("crew member {id}: unknown status {status_str}"))?,
        current_assignment: row.get(5)?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
        id,
    })
}

// ── Crew Assignments ──

const ASSIGNMENT_COLUMNS: &str = "id, booking_id, crew_id, status, assigned_at, updated_at";

pub fn insert_assignment(conn: &Connection, assignment: &CrewAssignment) -> anyhow::Result<()> {
    conn.execute(
        &format!("INSERT INTO crew_assignments ({ASSIGNMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            assignment.id,
            assignment.booking_id,
            assignment.crew_id,
            assignment.status.as_str(),
            format_ts(&assignment.assigned_at),
            format_ts(&assignment.updated_at),
        ],
    )
    .with_context(|| {
        format!(
            "failed to assign crew {} to booking {}",
            assignment.crew_id, assignment.booking_id
        )
    })?;
    Ok(())
}

pub fn get_assignment(conn: &Connection, id: &str) -> anyhow::Result<Option<CrewAssignment>> {
    let result = conn.query_row(
        &format!("SELECT {ASSIGNMENT_COLUMNS} FROM crew_assignments WHERE id = ?1"),
        params![id],
        |row| Ok(parse_assignment_row(row)),
    );

    match result {
        Ok(assignment) => Ok(Some(assignment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_assignments_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Vec<CrewAssignment>> {
    list_assignments_where(conn, "booking_id", booking_id)
}

pub fn list_assignments_for_crew(
    conn: &Connection,
    crew_id: &str,
) -> anyhow::Result<Vec<CrewAssignment>> {
    list_assignments_where(conn, "crew_id", crew_id)
}

fn list_assignments_where(
    conn: &Connection,
    column: &'static str,
    value: &str,
) -> anyhow::Result<Vec<CrewAssignment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM crew_assignments WHERE {column} = ?1
         ORDER BY assigned_at ASC, rowid ASC"
    ))?;
    let rows = stmt.query_map(params![value], |row| Ok(parse_assignment_row(row)))?;

    let mut assignments = vec![];
    for row in rows {
        assignments.push(row??);
    }
    Ok(assignments)
}

pub fn update_assignment_status(
    conn: &Connection,
    id: &str,
    status: AssignmentStatus,
    updated_at: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE crew_assignments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), format_ts(updated_at), id],
    )?;
    Ok(count > 0)
}

/// Closes out the open assignments of a finished booking.
pub fn complete_assignments_for_booking(
    conn: &Connection,
    booking_id: &str,
    updated_at: &DateTime<Utc>,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE crew_assignments SET status = 'completed', updated_at = ?2
         WHERE booking_id = ?1 AND status IN ('assigned', 'accepted')",
        params![booking_id, format_ts(updated_at)],
    )?;
    Ok(count)
}

pub fn reject_open_assignments_for_booking(
    conn: &Connection,
    booking_id: &str,
    updated_at: &DateTime<Utc>,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE crew_assignments SET status = 'rejected', updated_at = ?2
         WHERE booking_id = ?1 AND status IN ('assigned', 'accepted')",
        params![booking_id, format_ts(updated_at)],
    )?;
    Ok(count)
}

fn parse_assignment_row(row: &Row<'_>) -> anyhow::Result<CrewAssignment> {
    let id: String = row.get(0)?;
    let status_str: String = row.get(3)?;
    let assigned_at_str: String = row.get(4)?;
    let updated_at_str: String = row.get(5)?;

    Ok(CrewAssignment {
        booking_id: row.get(1)?,
        crew_id: row.get(2)?,
        status: AssignmentStatus::parse(&status_str)
            .with_context(|| format!("assignment {id}: unknown status {status_str}"))?,
        assigned_at: parse_ts(&assigned_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
        id,
    })
}

// ── Notifications ──

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, message, booking_id, is_read, created_at";

pub fn insert_notification(
    conn: &Connection,
    user_id: &str,
    kind: NotificationKind,
    title: &str,
    message: &str,
    booking_id: Option<&str>,
    created_at: &DateTime<Utc>,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO notifications (user_id, kind, title, message, booking_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            kind.as_str(),
            title,
            message,
            booking_id,
            format_ts(created_at)
        ],
    )
    .with_context(|| format!("failed to insert notification for {user_id}"))?;
    Ok(conn.last_insert_rowid())
}

/// Newest first, the way the badge list is displayed.
pub fn list_notifications(
    conn: &Connection,
    user_id: &str,
    unread_only: bool,
    limit: i64,
) -> anyhow::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
         ORDER BY id DESC LIMIT ?3"
    ))?;
    let rows = stmt.query_map(params![user_id, unread_only, limit], |row| {
        Ok(parse_notification_row(row))
    })?;

    let mut notifications = vec![];
    for row in rows {
        notifications.push(row??);
    }
    Ok(notifications)
}

/// Oldest first, for replaying what a stream subscriber missed.
pub fn get_notifications_since(
    conn: &Connection,
    since_id: i64,
    user_id: Option<&str>,
) -> anyhow::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE id > ?1 AND (?2 IS NULL OR user_id = ?2)
         ORDER BY id ASC"
    ))?;
    let rows = stmt.query_map(params![since_id, user_id], |row| {
        Ok(parse_notification_row(row))
    })?;

    let mut notifications = vec![];
    for row in rows {
        notifications.push(row??);
    }
    Ok(notifications)
}

pub fn count_unread(conn: &Connection, user_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn mark_notification_read(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(count > 0)
}

pub fn mark_all_read(conn: &Connection, user_id: &str) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
        params![user_id],
    )?;
    Ok(count)
}

fn parse_notification_row(row: &Row<'_>) -> anyhow::Result<Notification> {
    let id: i64 = row.get(0)?;
    let kind_str: String = row.get(2)?;
    let created_at_str: String = row.get(7)?;

    Ok(Notification {
        id,
        user_id: row.get(1)?,
        kind: NotificationKind::parse(&kind_str)
            .with_context(|| format!("notification {id}: unknown kind {kind_str}"))?,
        title: row.get(3)?,
        message: row.get(4)?,
        booking_id: row.get(5)?,
        read: row.get::<_, i32>(6)? != 0,
        created_at: parse_ts(&created_at_str)?,
    })
}
