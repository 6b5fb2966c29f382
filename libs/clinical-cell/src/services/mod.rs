pub mod diagnosis;
pub mod medication;
pub mod prescription;

pub use diagnosis::DiagnosisService;
pub use medication::MedicationService;
pub use prescription::PrescriptionService;
