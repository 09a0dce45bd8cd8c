use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub booking_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CrewAssignment,
    BookingStatus,
    AssignmentResponse,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::CrewAssignment => "crew_assignment",
            NotificationKind::BookingStatus => "booking_status",
            NotificationKind::AssignmentResponse => "assignment_response",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "crew_assignment" => Some(NotificationKind::CrewAssignment),
            "booking_status" => Some(NotificationKind::BookingStatus),
            "assignment_response" => Some(NotificationKind::AssignmentResponse),
            _ => None,
        }
    }
}
