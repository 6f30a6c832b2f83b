pub mod booking;
pub mod lifecycle;
pub mod readiness;

pub use booking::{AppointmentBookingService, Party};
pub use lifecycle::{Actor, AppointmentLifecycleService, Recipient, SideEffect};
pub use readiness::{is_joinable, ConsultationWindow};
