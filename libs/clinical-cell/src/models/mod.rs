pub mod diagnosis;
pub mod error;
pub mod medication;
pub mod prescription;

pub use diagnosis::*;
pub use error::ClinicalError;
pub use medication::*;
pub use prescription::*;
