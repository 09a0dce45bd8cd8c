use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrewMember {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub skills: Vec<String>,
    pub crew_status: CrewStatus,
    pub current_assignment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CrewMember {
    /// A member can take `booking_id` unless they are offline or already out on another job.
    pub fn is_available_for(&self, booking_id: &str) -> bool {
        match self.crew_status {
            CrewStatus::Available => true,
            CrewStatus::Offline => false,
            CrewStatus::Busy => self.current_assignment.as_deref() == Some(booking_id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCrewMember {
    pub id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CrewStatus {
    Available,
    Busy,
    Offline,
}

impl CrewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrewStatus::Available => "available",
            CrewStatus::Busy => "busy",
            CrewStatus::Offline => "offline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(CrewStatus::Available),
            "busy" => Some(CrewStatus::Busy),
            "offline" => Some(CrewStatus::Offline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrewAssignment {
    pub id: String,
    pub booking_id: String,
    pub crew_id: String,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Assigned,
    Accepted,
    Rejected,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::Accepted => "accepted",
            AssignmentStatus::Rejected => "rejected",
            AssignmentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assigned" => Some(AssignmentStatus::Assigned),
            "accepted" => Some(AssignmentStatus::Accepted),
            "rejected" => Some(AssignmentStatus::Rejected),
            "completed" => Some(AssignmentStatus::Completed),
            _ => None,
        }
    }

    pub fn can_move_to(&self, target: AssignmentStatus) -> bool {
        use AssignmentStatus::*;
        *self == target
            || matches!(
                (self, target),
                (Assigned, Accepted)
                    | (Assigned, Rejected)
                    | (Assigned, Completed)
                    | (Accepted, Rejected)
                    | (Accepted, Completed)
            )
    }
}
