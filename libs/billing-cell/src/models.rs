use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

pub const DEFAULT_PAYMENT_TERMS_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    InProgress,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::InProgress => "in_progress",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Defi,
    Insurance,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::Defi,
        PaymentMethod::Insurance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Defi => "defi",
            PaymentMethod::Insurance => "insurance",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or(BillingError::InvalidPaymentMethod)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Consultation,
    Medication,
    #[default]
    Additional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total: f64,
    #[serde(rename = "type", default)]
    pub item_type: ItemType,
    pub medication_id: Option<Uuid>,
    pub prescription_id: Option<Uuid>,
}

/// Line item as submitted; `total` is always derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItemInput {
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
    #[serde(rename = "type", default)]
    pub item_type: ItemType,
    pub medication_id: Option<Uuid>,
    pub prescription_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_last4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crypto_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_received: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_given: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
    pub consultation_fee: f64,
    pub medication_total: f64,
    pub additional_charges_total: f64,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub amount: f64,
    pub status: InvoiceStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_details: Option<PaymentDetails>,
    pub notes: Option<String>,
    pub prescription_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoiceRequest {
    pub patient_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<InvoiceItemInput>,
    #[serde(default)]
    pub discount_amount: f64,
    pub status: Option<InvoiceStatus>,
    pub notes: Option<String>,
    pub prescription_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInvoiceRequest {
    pub due_date: Option<DateTime<Utc>>,
    pub items: Option<Vec<InvoiceItemInput>>,
    pub discount_amount: Option<f64>,
    pub status: Option<InvoiceStatus>,
    pub notes: Option<String>,
    pub prescription_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
}

impl UpdateInvoiceRequest {
    pub fn touches_totals(&self) -> bool {
        self.items.is_some() || self.discount_amount.is_some()
    }
}

/// Method arrives as free text so an unknown value gets the listed-methods message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentRequest {
    pub payment_method: Option<String>,
    pub payment_details: Option<PaymentDetails>,
}

// ==============================================================================
// STATS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceAmountRow {
    pub status: InvoiceStatus,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    pub status: InvoiceStatus,
    pub count: u64,
    pub total_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceStats {
    pub stats: Vec<StatusSummary>,
    pub total_invoices: u64,
    pub total_revenue: f64,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BillingError {
    #[error("No invoice found with that ID")]
    NotFound,

    #[error("Payment method is required")]
    MissingPaymentMethod,

    #[error("Invalid payment method. Must be one of: cash, card, defi, insurance")]
    InvalidPaymentMethod,

    #[error("Cannot take payment for a cancelled invoice")]
    InvoiceCancelled,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl BillingError {
    pub(crate) fn database(err: impl fmt::Display) -> Self {
        BillingError::Database(err.to_string())
    }
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::NotFound => AppError::NotFound(err.to_string()),
            BillingError::MissingPaymentMethod
            | BillingError::InvalidPaymentMethod
            | BillingError::InvoiceCancelled => AppError::BadRequest(err.to_string()),
            BillingError::Validation(msg) => AppError::ValidationError(msg),
            BillingError::Database(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn payment_method_parsing_names_the_options() {
        assert_eq!("defi".parse::<PaymentMethod>().unwrap(), PaymentMethod::Defi);
        let err = "cheque".parse::<PaymentMethod>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid payment method. Must be one of: cash, card, defi, insurance"
        );
    }

    #[test]
    fn status_uses_snake_case_on_the_wire() {
        assert_eq!(serde_json::to_value(InvoiceStatus::InProgress).unwrap(), json!("in_progress"));
        assert_eq!(InvoiceStatus::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn item_type_defaults_to_additional() {
        let item: InvoiceItemInput =
            serde_json::from_value(json!({ "description": "Dressing", "quantity": 1, "unit_price": 3.0 }))
                .unwrap();
        assert_eq!(item.item_type, ItemType::Additional);
    }

    #[test]
    fn errors_map_to_http_classes() {
        assert_matches!(AppError::from(BillingError::NotFound), AppError::NotFound(_));
        assert_matches!(AppError::from(BillingError::MissingPaymentMethod), AppError::BadRequest(_));
        assert_matches!(
            AppError::from(BillingError::Validation("x".into())),
            AppError::ValidationError(_)
        );
    }
}
