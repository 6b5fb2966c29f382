pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod handlers;
pub mod router;

pub use config::SchedulingConfig;
pub use error::SchedulingError;
pub use models::*;
pub use services::*;
pub use router::appointment_routes;
