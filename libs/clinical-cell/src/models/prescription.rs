use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ClinicalError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrescriptionStatus {
    #[default]
    Pending,
    Filled,
    Refilled,
    Cancelled,
}

impl PrescriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PrescriptionStatus::Pending => "pending",
            PrescriptionStatus::Filled => "filled",
            PrescriptionStatus::Refilled => "refilled",
            PrescriptionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub medication_id: Uuid,
    pub prescribed_by: Uuid,
    pub date_issued: DateTime<Utc>,
    pub quantity: String,
    pub refills_allowed: u32,
    pub refills_remaining: u32,
    pub status: PrescriptionStatus,
    pub instructions: String,
    pub filled_by: Option<String>,
    pub filled_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields changed by a dispensing transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispenseUpdate {
    pub status: PrescriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refills_remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_date: Option<DateTime<Utc>>,
}

impl Prescription {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiration_date.is_some_and(|expires| expires < today)
    }

    /// First dispense by a pharmacy. Only pending prescriptions can be filled.
    pub fn fill(&self, pharmacy_id: Option<&str>, now: DateTime<Utc>) -> Result<DispenseUpdate, ClinicalError> {
        let pharmacy_id = pharmacy_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ClinicalError::MissingPharmacy)?;

        if self.status != PrescriptionStatus::Pending {
            return Err(ClinicalError::NotPending(self.status));
        }

        Ok(DispenseUpdate {
            status: PrescriptionStatus::Filled,
            refills_remaining: None,
            filled_by: Some(pharmacy_id.to_string()),
            filled_date: Some(now),
        })
    }

    /// Repeat dispense; consumes one refill.
    pub fn refill(&self, today: NaiveDate) -> Result<DispenseUpdate, ClinicalError> {
        if self.refills_remaining == 0 {
            return Err(ClinicalError::NoRefillsRemaining);
        }
        if !matches!(self.status, PrescriptionStatus::Filled | PrescriptionStatus::Refilled) {
            return Err(ClinicalError::NotRefillable(self.status));
        }
        if self.is_expired(today) {
            return Err(ClinicalError::Expired);
        }

        Ok(DispenseUpdate {
            status: PrescriptionStatus::Refilled,
            refills_remaining: Some(self.refills_remaining - 1),
            filled_by: None,
            filled_date: None,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub patient_id: Uuid,
    pub medication_id: Uuid,
    pub prescribed_by: Option<Uuid>,
    pub date_issued: Option<DateTime<Utc>>,
    pub quantity: String,
    #[serde(default)]
    pub refills_allowed: u32,
    pub instructions: String,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPrescription {
    pub patient_id: Uuid,
    pub medication_id: Uuid,
    pub prescribed_by: Uuid,
    pub date_issued: DateTime<Utc>,
    pub quantity: String,
    pub refills_allowed: u32,
    pub refills_remaining: u32,
    pub status: PrescriptionStatus,
    pub instructions: String,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePrescriptionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refills_allowed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refills_remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PrescriptionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,
}

impl UpdatePrescriptionRequest {
    /// Reconciles the refill counters with the record they will be merged into.
    /// Lowering `refills_allowed` clamps the remaining count along with it.
    pub fn reconcile_refills(&mut self, current: &Prescription) -> Result<(), ClinicalError> {
        let allowed = self.refills_allowed.unwrap_or(current.refills_allowed);
        if self.refills_remaining.is_none() && current.refills_remaining > allowed {
            self.refills_remaining = Some(allowed);
        }

        let remaining = self.refills_remaining.unwrap_or(current.refills_remaining);
        if remaining > allowed {
            return Err(ClinicalError::Validation(
                "Refills remaining cannot exceed refills allowed".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FillPrescriptionRequest {
    pub pharmacy_id: Option<String>,
}
