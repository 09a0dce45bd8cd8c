pub mod assignment;
pub mod crew;
pub mod lifecycle;
pub mod notifications;
pub mod push;
