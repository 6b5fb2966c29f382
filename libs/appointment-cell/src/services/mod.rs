pub mod time;
pub mod conflict;
pub mod slots;
pub mod business_hours;
pub mod store;
pub mod booking;

pub use time::*;
pub use conflict::*;
pub use slots::*;
pub use business_hours::*;
pub use store::*;
pub use booking::AppointmentService;
