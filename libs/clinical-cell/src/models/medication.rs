use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{required, ClinicalError};

pub const DEFAULT_REORDER_LEVEL: u32 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdministrationRoute {
    Oral,
    Intravenous,
    Intramuscular,
    Subcutaneous,
    Topical,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MedicationStatus {
    #[default]
    Active,
    Completed,
    Discontinued,
}

impl MedicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MedicationStatus::Active => "active",
            MedicationStatus::Completed => "completed",
            MedicationStatus::Discontinued => "discontinued",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Gbp,
    Usd,
    Eur,
    Kes,
    Eth,
    Btc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub dosage: String,
    pub frequency: String,
    pub route: AdministrationRoute,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: MedicationStatus,
    pub patient_id: Uuid,
    pub prescribed_by: Uuid,
    pub instructions: Option<String>,
    #[serde(default)]
    pub side_effects: Vec<String>,
    #[serde(default)]
    pub contraindications: Vec<String>,
    pub unit_price: f64,
    #[serde(default)]
    pub currency: Currency,
    pub pack_size: u32,
    pub manufacturer: Option<String>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub stock_quantity: u32,
    pub reorder_level: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medication {
    pub fn needs_reorder(&self) -> bool {
        self.stock_quantity <= self.reorder_level
    }
}

/// Medication as rendered to clients, with the derived stock flag.
#[derive(Debug, Clone, Serialize)]
pub struct MedicationView {
    #[serde(flatten)]
    pub medication: Medication,
    pub needs_reorder: bool,
}

impl From<Medication> for MedicationView {
    fn from(medication: Medication) -> Self {
        let needs_reorder = medication.needs_reorder();
        Self {
            medication,
            needs_reorder,
        }
    }
}

fn default_pack_size() -> u32 {
    1
}

fn default_reorder_level() -> u32 {
    DEFAULT_REORDER_LEVEL
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMedicationRequest {
    pub name: String,
    pub description: String,
    pub dosage: String,
    pub frequency: String,
    pub route: AdministrationRoute,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: MedicationStatus,
    pub patient_id: Uuid,
    pub prescribed_by: Option<Uuid>,
    pub instructions: Option<String>,
    #[serde(default)]
    pub side_effects: Vec<String>,
    #[serde(default)]
    pub contraindications: Vec<String>,
    pub unit_price: f64,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default = "default_pack_size")]
    pub pack_size: u32,
    pub manufacturer: Option<String>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub stock_quantity: u32,
    #[serde(default = "default_reorder_level")]
    pub reorder_level: u32,
}

impl CreateMedicationRequest {
    pub fn validate(&mut self) -> Result<(), ClinicalError> {
        self.name = required("name", &self.name)?;
        self.description = required("description", &self.description)?;
        self.dosage = required("dosage", &self.dosage)?;
        self.frequency = required("frequency", &self.frequency)?;
        validate_price(self.unit_price)?;
        validate_pack_size(self.pack_size)?;
        validate_period(self.start_date, self.end_date)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMedicationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<AdministrationRoute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MedicationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pack_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder_level: Option<u32>,
}

impl UpdateMedicationRequest {
    pub fn validate(&mut self) -> Result<(), ClinicalError> {
        for (field, value) in [
            ("name", &mut self.name),
            ("description", &mut self.description),
            ("dosage", &mut self.dosage),
            ("frequency", &mut self.frequency),
        ] {
            if let Some(text) = value {
                *text = required(field, text)?;
            }
        }
        if let Some(price) = self.unit_price {
            validate_price(price)?;
        }
        if let Some(pack_size) = self.pack_size {
            validate_pack_size(pack_size)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicationQuery {
    pub patient: Option<Uuid>,
    pub status: Option<MedicationStatus>,
    pub needs_reorder: Option<bool>,
}

fn validate_price(price: f64) -> Result<(), ClinicalError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ClinicalError::Validation("Unit price cannot be negative".to_string()));
    }
    Ok(())
}

fn validate_pack_size(pack_size: u32) -> Result<(), ClinicalError> {
    if pack_size < 1 {
        return Err(ClinicalError::Validation("Pack size must be at least 1".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_period(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), ClinicalError> {
    match end {
        Some(end) if end < start => Err(ClinicalError::Validation(
            "End date cannot be before start date".to_string(),
        )),
        _ => Ok(()),
    }
}
