use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    #[default]
    Moderate,
    Severe,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosisStatus {
    Pending,
    #[default]
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlannedMedication {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TreatmentPlan {
    #[serde(default)]
    pub medications: Vec<PlannedMedication>,
    #[serde(default)]
    pub procedures: Vec<String>,
    pub follow_up: Option<String>,
    pub notes: Option<String>,
}

/// Findings keyed by body system or vital-sign name.
pub type Observations = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub diagnosed_by: Uuid,
    pub appointment_id: Uuid,
    pub diagnosis_date: DateTime<Utc>,
    pub primary_diagnosis: String,
    #[serde(default)]
    pub secondary_diagnoses: Vec<String>,
    #[serde(default)]
    pub icd10_codes: Vec<String>,
    pub symptoms: String,
    #[serde(default)]
    pub physical_exam: Observations,
    #[serde(default)]
    pub vital_signs: Observations,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub treatment_plan: TreatmentPlan,
    pub follow_up_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: DiagnosisStatus,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Diagnosis {
    pub fn is_completed(&self) -> bool {
        self.status == DiagnosisStatus::Completed
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDiagnosisRequest {
    pub patient_id: Uuid,
    pub appointment_id: Uuid,
    pub diagnosis_date: Option<DateTime<Utc>>,
    pub primary_diagnosis: String,
    #[serde(default)]
    pub secondary_diagnoses: Vec<String>,
    #[serde(default)]
    pub icd10_codes: Vec<String>,
    pub symptoms: String,
    #[serde(default)]
    pub physical_exam: Observations,
    #[serde(default)]
    pub vital_signs: Observations,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub treatment_plan: TreatmentPlan,
    pub follow_up_date: Option<NaiveDate>,
    pub status: Option<DiagnosisStatus>,
    pub notes: Option<String>,
}

/// Row written on create; `diagnosed_by` always comes from the caller.
#[derive(Debug, Clone, Serialize)]
pub struct NewDiagnosis {
    pub patient_id: Uuid,
    pub diagnosed_by: Uuid,
    pub appointment_id: Uuid,
    pub diagnosis_date: DateTime<Utc>,
    pub primary_diagnosis: String,
    pub secondary_diagnoses: Vec<String>,
    pub icd10_codes: Vec<String>,
    pub symptoms: String,
    pub physical_exam: Observations,
    pub vital_signs: Observations,
    pub severity: Severity,
    pub treatment_plan: TreatmentPlan,
    pub follow_up_date: Option<NaiveDate>,
    pub status: DiagnosisStatus,
    pub notes: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDiagnosisRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_diagnoses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icd10_codes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_exam: Option<Observations>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vital_signs: Option<Observations>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment_plan: Option<TreatmentPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DiagnosisStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The slice of an appointment row a diagnosis needs to verify its link.
#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentRef {
    pub id: Uuid,
    pub patient_id: Uuid,
}
