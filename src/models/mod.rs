pub mod booking;
pub mod crew;
pub mod notification;

pub use booking::{
    Booking, BookingStatus, CustomerRef, NewBooking, PaymentMethod, PaymentStatus, Schedule,
    ServiceDescriptor, VehicleDescriptor,
};
pub use crew::{AssignmentStatus, CrewAssignment, CrewMember, CrewStatus, NewCrewMember};
pub use notification::{Notification, NotificationKind};
