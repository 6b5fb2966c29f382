use serde::Serialize;

use crate::models::{BillingError, InvoiceItem, InvoiceItemInput, ItemType};

/// Money is carried as `f64` and rounded to cents after every arithmetic step.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InvoiceTotals {
    pub consultation_fee: f64,
    pub medication_total: f64,
    pub additional_charges_total: f64,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub amount: f64,
}

impl InvoiceTotals {
    /// Buckets item totals by type. A discount larger than the subtotal yields a zero amount.
    pub fn compute(items: &[InvoiceItem], discount_amount: f64) -> Result<Self, BillingError> {
        if !discount_amount.is_finite() || discount_amount < 0.0 {
            return Err(BillingError::Validation("Discount cannot be negative".to_string()));
        }

        let sum_of = |kind: ItemType| {
            round_cents(
                items
                    .iter()
                    .filter(|item| item.item_type == kind)
                    .map(|item| item.total)
                    .sum(),
            )
        };

        let consultation_fee = sum_of(ItemType::Consultation);
        let medication_total = sum_of(ItemType::Medication);
        let additional_charges_total = sum_of(ItemType::Additional);
        let subtotal = round_cents(consultation_fee + medication_total + additional_charges_total);
        let discount_amount = round_cents(discount_amount);

        Ok(Self {
            consultation_fee,
            medication_total,
            additional_charges_total,
            subtotal,
            discount_amount,
            amount: round_cents((subtotal - discount_amount).max(0.0)),
        })
    }
}

/// Validates submitted line items and derives each `total`.
pub fn price_items(items: Vec<InvoiceItemInput>) -> Result<Vec<InvoiceItem>, BillingError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let description = item.description.trim();
            if description.is_empty() {
                return Err(BillingError::Validation(format!("Item {} description is required", index + 1)));
            }
            if item.quantity < 1 {
                return Err(BillingError::Validation(format!("Item {} quantity must be at least 1", index + 1)));
            }
            if !item.unit_price.is_finite() || item.unit_price < 0.0 {
                return Err(BillingError::Validation(format!("Item {} unit price cannot be negative", index + 1)));
            }

            Ok(InvoiceItem {
                description: description.to_string(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total: round_cents(item.quantity as f64 * item.unit_price),
                item_type: item.item_type,
                medication_id: item.medication_id,
                prescription_id: item.prescription_id,
            })
        })
        .collect()
}
