use chrono::{DateTime, Duration, SubsecRound, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Booking, BookingStatus, NewBooking, Notification, NotificationKind, PaymentStatus,
};
use crate::services::notifications;

/// Current time at the precision timestamps are stored with.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// A write timestamp that is strictly later than `previous`, even when the clock has
/// not moved on since the last write.
pub fn next_timestamp(previous: &DateTime<Utc>) -> DateTime<Utc> {
    let now = now_millis();
    let floor = *previous + Duration::milliseconds(1);
    now.max(floor)
}

/// What the caller last saw. Any field that is set must still match the stored row.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    pub expected_version: Option<i64>,
    pub expected_status: Option<BookingStatus>,
}

#[derive(Debug)]
pub struct StatusChange {
    pub booking: Booking,
    pub notifications: Vec<Notification>,
}

pub fn create_booking(conn: &Connection, new: NewBooking) -> Result<Booking, AppError> {
    if new.service.name.trim().is_empty() {
        return Err(AppError::Validation("service name is required".to_string()));
    }
    if new.service.duration_minutes < 0 {
        return Err(AppError::Validation(
            "service duration cannot be negative".to_string(),
        ));
    }
    if !new.price.is_finite() || new.price < 0.0 {
        return Err(AppError::Validation("price must be a non-negative number".to_string()));
    }
    if !new.customer.has_identifier() {
        return Err(AppError::Validation(
            "customer needs a userId, phone or email".to_string(),
        ));
    }
    if new.schedule.time_slot.trim().is_empty() {
        return Err(AppError::Validation("schedule time slot is required".to_string()));
    }

    let status = new.status.unwrap_or(BookingStatus::Pending);
    if !matches!(status, BookingStatus::Pending | BookingStatus::Confirmed) {
        return Err(AppError::Validation(format!(
            "new bookings start as pending or confirmed, not {status}"
        )));
    }

    let id = match new.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => generate_booking_id(),
    };
    if queries::get_booking_by_id(conn, &id)?.is_some() {
        return Err(AppError::Validation(format!("booking {id} already exists")));
    }

    let now = now_millis();
    let booking = Booking {
        id,
        customer: new.customer,
        service: new.service,
        vehicle: new.vehicle,
        schedule: new.schedule,
        price: new.price,
        payment_method: new.payment_method,
        payment_status: PaymentStatus::Unpaid,
        status,
        crew_ids: vec![],
        notes: new.notes,
        version: 1,
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(conn, &booking)?;

    tracing::info!(booking_id = %booking.id, status = %booking.status, "booking created");
    Ok(booking)
}

fn generate_booking_id() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("BOOK_{}", raw.chars().take(8).collect::<String>().to_uppercase())
}

/// Moves a booking to `target` as one guarded row update, together with the crew and
/// notification writes that follow from the new status.
pub fn transition_status(
    conn: &Connection,
    booking_id: &str,
    target: BookingStatus,
    expectation: &Expectation,
) -> Result<StatusChange, AppError> {
    let tx = conn.unchecked_transaction()?;

    let current = queries::get_booking_by_id(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    let stale_version = expectation
        .expected_version
        .is_some_and(|v| v != current.version);
    let stale_status = expectation
        .expected_status
        .is_some_and(|s| s != current.status);
    if stale_version || stale_status {
        tracing::warn!(
            booking_id,
            stored_version = current.version,
            stored_status = %current.status,
            "status update based on a stale read"
        );
        return Err(AppError::ConcurrentModification {
            entity: "booking",
            id: booking_id.to_string(),
        });
    }

    if !current.status.can_transition_to(target) {
        return Err(AppError::InvalidTransition {
            entity: "booking",
            id: booking_id.to_string(),
            from: current.status.to_string(),
            to: target.to_string(),
        });
    }
    if target != current.status && target.requires_crew() && current.crew_ids.is_empty() {
        return Err(AppError::Validation(format!(
            "booking {booking_id} has no crew assigned; cannot move to {target}"
        )));
    }

    let mut updated = current.clone();
    updated.status = target;
    updated.version = current.version + 1;
    updated.updated_at = next_timestamp(&current.updated_at);
    if target == BookingStatus::Paid {
        updated.payment_status = PaymentStatus::Paid;
    }

    if !queries::update_booking_guarded(&tx, &updated, current.version)? {
        return Err(AppError::ConcurrentModification {
            entity: "booking",
            id: booking_id.to_string(),
        });
    }

    match target {
        BookingStatus::Completed | BookingStatus::Paid => {
            queries::complete_assignments_for_booking(&tx, booking_id, &updated.updated_at)?;
            queries::release_crew_for_booking(&tx, booking_id, &updated.updated_at)?;
        }
        BookingStatus::Cancelled => {
            queries::reject_open_assignments_for_booking(&tx, booking_id, &updated.updated_at)?;
            queries::release_crew_for_booking(&tx, booking_id, &updated.updated_at)?;
        }
        _ => {}
    }

    let mut sent = vec![];
    if current.status != target {
        if let Some(user_id) = updated.customer.user_id.as_deref() {
            sent.push(notifications::record(
                &tx,
                user_id,
                NotificationKind::BookingStatus,
                "Booking update",
                &format!(
                    "Your booking {booking_id} is now {}",
                    target.as_str().replace('_', " ")
                ),
                Some(booking_id),
            )?);
        }
    }

    tx.commit()?;

    tracing::info!(
        booking_id,
        from = %current.status,
        to = %target,
        version = updated.version,
        "booking status updated"
    );

    Ok(StatusChange {
        booking: updated,
        notifications: sent,
    })
}
