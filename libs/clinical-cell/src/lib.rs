pub mod models;
pub mod services;
pub mod handlers;
pub mod router;

pub use models::*;
pub use router::{diagnosis_routes, medication_routes, prescription_routes};
