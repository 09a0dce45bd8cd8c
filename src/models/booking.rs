use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub customer: CustomerRef,
    pub service: ServiceDescriptor,
    pub vehicle: VehicleDescriptor,
    pub schedule: Schedule,
    pub price: f64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: BookingStatus,
    pub crew_ids: Vec<String>,
    pub notes: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A registered user, or the contact details of a guest who booked without an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl CustomerRef {
    pub fn has_identifier(&self) -> bool {
        [&self.user_id, &self.phone, &self.email]
            .iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub name: String,
    #[serde(default)]
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub date: NaiveDate,
    pub time_slot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Body of a create-booking request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub id: Option<String>,
    pub customer: CustomerRef,
    pub service: ServiceDescriptor,
    #[serde(default)]
    pub vehicle: VehicleDescriptor,
    pub schedule: Schedule,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub status: Option<BookingStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Online => "online",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            "online" => Some(PaymentMethod::Online),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "paid" => Some(PaymentStatus::Paid),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

/// Lifecycle stage of a booking. The wire strings are shared with stored data and
/// must not change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CrewAssigned,
    CrewGoing,
    CrewArrived,
    InProgress,
    Washing,
    Completed,
    Paid,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 10] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::CrewAssigned,
        BookingStatus::CrewGoing,
        BookingStatus::CrewArrived,
        BookingStatus::InProgress,
        BookingStatus::Washing,
        BookingStatus::Completed,
        BookingStatus::Paid,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CrewAssigned => "crew_assigned",
            BookingStatus::CrewGoing => "crew_going",
            BookingStatus::CrewArrived => "crew_arrived",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Washing => "washing",
            BookingStatus::Completed => "completed",
            BookingStatus::Paid => "paid",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Position along the forward sequence. `in_progress` and `washing` share a stage;
    /// cancellation sits outside the sequence.
    fn stage(&self) -> Option<u8> {
        match self {
            BookingStatus::Pending => Some(0),
            BookingStatus::Confirmed => Some(1),
            BookingStatus::CrewAssigned => Some(2),
            BookingStatus::CrewGoing => Some(3),
            BookingStatus::CrewArrived => Some(4),
            BookingStatus::InProgress | BookingStatus::Washing => Some(5),
            BookingStatus::Completed => Some(6),
            BookingStatus::Paid => Some(7),
            BookingStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Paid | BookingStatus::Cancelled)
    }

    /// Stages that only make sense once somebody has been sent out.
    pub fn requires_crew(&self) -> bool {
        matches!(
            self,
            BookingStatus::CrewAssigned
                | BookingStatus::CrewGoing
                | BookingStatus::CrewArrived
                | BookingStatus::InProgress
                | BookingStatus::Washing
        )
    }

    /// Whether crew can still be added to a booking in this stage.
    pub fn accepts_crew(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::CrewAssigned
        )
    }

    pub fn can_transition_to(&self, target: BookingStatus) -> bool {
        if *self == target {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match (self.stage(), target.stage()) {
            // Cancellation is open until the job is completed.
            (Some(from), None) => from < 6,
            (Some(from), Some(to)) => to >= from,
            _ => false,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings_round_trip() {
        for status in BookingStatus::ALL {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert_eq!(BookingStatus::parse("bogus"), None);
    }

    #[test]
    fn test_forward_transitions_allowed() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(CrewAssigned));
        assert!(CrewAssigned.can_transition_to(CrewArrived));
        assert!(InProgress.can_transition_to(Washing));
        assert!(Washing.can_transition_to(InProgress));
        assert!(Completed.can_transition_to(Paid));
    }

    #[test]
    fn test_backward_transitions_rejected() {
        use BookingStatus::*;
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!CrewGoing.can_transition_to(CrewAssigned));
        assert!(!Completed.can_transition_to(Washing));
        assert!(!Paid.can_transition_to(Completed));
    }

    #[test]
    fn test_cancellation_branch() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Cancelled));
        assert!(CrewArrived.can_transition_to(Cancelled));
        assert!(Washing.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Confirmed));
    }

    #[test]
    fn test_same_status_is_always_allowed() {
        for status in BookingStatus::ALL {
            assert!(status.can_transition_to(status), "{status} -> {status}");
        }
    }

    #[test]
    fn test_customer_identifier() {
        let guest = CustomerRef {
            name: Some("Walk-in".to_string()),
            phone: Some("+15550001111".to_string()),
            ..Default::default()
        };
        assert!(guest.has_identifier());

        let anonymous = CustomerRef {
            name: Some("Nobody".to_string()),
            email: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(!anonymous.has_identifier());
    }

    #[test]
    fn test_booking_json_uses_camel_case() {
        let json = serde_json::json!({
            "customer": { "userId": "U1" },
            "service": { "name": "Full wash", "durationMinutes": 45 },
            "schedule": { "date": "2025-06-16", "timeSlot": "10:00" },
            "price": 25.0,
            "paymentMethod": "card"
        });
        let new: NewBooking = serde_json::from_value(json).unwrap();
        assert_eq!(new.customer.user_id.as_deref(), Some("U1"));
        assert_eq!(new.service.duration_minutes, 45);
        assert_eq!(new.schedule.time_slot, "10:00");
        assert_eq!(new.payment_method, PaymentMethod::Card);
        assert!(new.status.is_none());
    }
}
