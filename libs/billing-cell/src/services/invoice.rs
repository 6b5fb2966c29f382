use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    BillingError, CreateInvoiceRequest, Invoice, InvoiceAmountRow, InvoiceItem, InvoiceStats,
    InvoiceStatus, PaymentDetails, PaymentMethod, PaymentRequest, UpdateInvoiceRequest,
    DEFAULT_PAYMENT_TERMS_DAYS,
};
use crate::services::numbering::invoice_number;
use crate::services::stats::summarize;
use crate::services::totals::{price_items, InvoiceTotals};

#[derive(Debug, Serialize)]
struct NewInvoice {
    invoice_number: String,
    patient_id: Uuid,
    provider_id: Uuid,
    date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    items: Vec<InvoiceItem>,
    #[serde(flatten)]
    totals: InvoiceTotals,
    status: InvoiceStatus,
    notes: Option<String>,
    prescription_id: Option<Uuid>,
    appointment_id: Option<Uuid>,
    is_active: bool,
}

#[derive(Debug, Default, Serialize)]
struct InvoiceChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<Vec<InvoiceItem>>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    totals: Option<InvoiceTotals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<InvoiceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prescription_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    appointment_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct PaymentUpdate {
    status: InvoiceStatus,
    payment_method: PaymentMethod,
    payment_date: DateTime<Utc>,
    payment_details: PaymentDetails,
}

pub struct InvoiceService {
    supabase: SupabaseClient,
}

impl InvoiceService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    pub async fn list_invoices(&self, auth_token: &str) -> Result<Vec<Invoice>, BillingError> {
        self.select_many("is_active=eq.true&order=date.desc", auth_token).await
    }

    pub async fn invoices_for_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Vec<Invoice>, BillingError> {
        let filter = format!("patient_id=eq.{}&is_active=eq.true&order=date.desc", patient_id);
        self.select_many(&filter, auth_token).await
    }

    pub async fn invoices_by_status(&self, status: InvoiceStatus, auth_token: &str) -> Result<Vec<Invoice>, BillingError> {
        let filter = format!("status=eq.{}&is_active=eq.true&order=date.desc", status);
        self.select_many(&filter, auth_token).await
    }

    pub async fn get_invoice(&self, invoice_id: Uuid, auth_token: &str) -> Result<Invoice, BillingError> {
        self.supabase
            .select_one("invoices", &format!("id=eq.{}&is_active=eq.true", invoice_id), auth_token)
            .await
            .map_err(BillingError::database)?
            .ok_or(BillingError::NotFound)
    }

    pub async fn invoice_stats(&self, auth_token: &str) -> Result<InvoiceStats, BillingError> {
        let rows: Vec<InvoiceAmountRow> = self
            .supabase
            .request(
                Method::GET,
                "/rest/v1/invoices?is_active=eq.true&select=status,amount",
                Some(auth_token),
                None,
            )
            .await
            .map_err(BillingError::database)?;

        Ok(summarize(&rows))
    }

    // ==============================================================================
    // COMMANDS
    // ==============================================================================

    pub async fn create_invoice(
        &self,
        request: CreateInvoiceRequest,
        issued_by: Uuid,
        auth_token: &str,
    ) -> Result<Invoice, BillingError> {
        let items = price_items(request.items)?;
        let totals = InvoiceTotals::compute(&items, request.discount_amount)?;

        let date = request.date.unwrap_or_else(Utc::now);
        let due_date = request
            .due_date
            .unwrap_or(date + Duration::days(DEFAULT_PAYMENT_TERMS_DAYS));
        if due_date < date {
            return Err(BillingError::Validation("Due date cannot be before the invoice date".to_string()));
        }

        let invoice = NewInvoice {
            invoice_number: self.next_invoice_number(auth_token).await?,
            patient_id: request.patient_id,
            provider_id: request.provider_id.unwrap_or(issued_by),
            date,
            due_date,
            items,
            totals,
            status: request.status.unwrap_or_default(),
            notes: request.notes,
            prescription_id: request.prescription_id,
            appointment_id: request.appointment_id,
            is_active: true,
        };
        let body = serde_json::to_value(&invoice).map_err(BillingError::database)?;

        let created: Invoice = self
            .supabase
            .insert("invoices", auth_token, body)
            .await
            .map_err(BillingError::database)?;

        info!(
            "Invoice {} created for patient {} ({:.2})",
            created.invoice_number, created.patient_id, created.amount
        );
        Ok(created)
    }

    pub async fn update_invoice(
        &self,
        invoice_id: Uuid,
        request: UpdateInvoiceRequest,
        auth_token: &str,
    ) -> Result<Invoice, BillingError> {
        let current = self.get_invoice(invoice_id, auth_token).await?;

        let mut changes = InvoiceChanges {
            due_date: request.due_date,
            status: request.status,
            notes: request.notes.clone(),
            prescription_id: request.prescription_id,
            appointment_id: request.appointment_id,
            ..Default::default()
        };

        if request.touches_totals() {
            let items = match request.items {
                Some(items) => price_items(items)?,
                None => current.items.clone(),
            };
            let discount = request.discount_amount.unwrap_or(current.discount_amount);
            changes.totals = Some(InvoiceTotals::compute(&items, discount)?);
            changes.items = Some(items);
        }

        if let Some(due_date) = changes.due_date {
            if due_date < current.date {
                return Err(BillingError::Validation("Due date cannot be before the invoice date".to_string()));
            }
        }

        self.persist(invoice_id, &changes, auth_token).await
    }

    /// Marks the invoice paid, then marks any linked prescription filled.
    /// The prescription update is best effort: its failure is logged and the payment stands.
    pub async fn record_payment(
        &self,
        invoice_id: Uuid,
        request: PaymentRequest,
        auth_token: &str,
    ) -> Result<Invoice, BillingError> {
        let method: PaymentMethod = request
            .payment_method
            .as_deref()
            .map(str::trim)
            .filter(|method| !method.is_empty())
            .ok_or(BillingError::MissingPaymentMethod)?
            .parse()?;

        let current = self.get_invoice(invoice_id, auth_token).await?;
        if current.status == InvoiceStatus::Cancelled {
            warn!("Payment attempted on cancelled invoice {}", current.invoice_number);
            return Err(BillingError::InvoiceCancelled);
        }

        let now = Utc::now();
        let update = PaymentUpdate {
            status: InvoiceStatus::Paid,
            payment_method: method,
            payment_date: now,
            payment_details: request.payment_details.unwrap_or_default(),
        };
        let paid = self.persist(invoice_id, &update, auth_token).await?;

        info!("Invoice {} paid by {}", paid.invoice_number, method.as_str());

        if let Some(prescription_id) = paid.prescription_id {
            self.mark_prescription_filled(prescription_id, now, auth_token).await;
        }

        Ok(paid)
    }

    pub async fn deactivate_invoice(&self, invoice_id: Uuid, auth_token: &str) -> Result<(), BillingError> {
        self.persist(invoice_id, &json!({ "is_active": false }), auth_token).await?;
        info!("Invoice {} deactivated", invoice_id);
        Ok(())
    }

    // ==============================================================================
    // HELPERS
    // ==============================================================================

    async fn next_invoice_number(&self, auth_token: &str) -> Result<String, BillingError> {
        let (_, existing): (Vec<Value>, u64) = self
            .supabase
            .request_with_count("/rest/v1/invoices?select=id&limit=1", Some(auth_token))
            .await
            .map_err(BillingError::database)?;

        Ok(invoice_number(Utc::now().timestamp_millis(), existing + 1))
    }

    async fn mark_prescription_filled(&self, prescription_id: Uuid, filled_at: DateTime<Utc>, auth_token: &str) {
        let body = json!({
            "status": "filled",
            "filled_date": filled_at,
            "updated_at": filled_at,
        });

        let result = self
            .supabase
            .update::<Value>("prescriptions", &format!("id=eq.{}", prescription_id), auth_token, body)
            .await;

        match result {
            Ok(Some(_)) => debug!("Prescription {} marked filled after payment", prescription_id),
            Ok(None) => warn!("Paid invoice references missing prescription {}", prescription_id),
            Err(e) => warn!("Failed to mark prescription {} filled: {}", prescription_id, e),
        }
    }

    async fn persist<T: Serialize>(&self, invoice_id: Uuid, changes: &T, auth_token: &str) -> Result<Invoice, BillingError> {
        let mut body = serde_json::to_value(changes).map_err(BillingError::database)?;
        if let Value::Object(map) = &mut body {
            map.insert("updated_at".to_string(), json!(Utc::now()));
        }

        self.supabase
            .update(
                "invoices",
                &format!("id=eq.{}&is_active=eq.true", invoice_id),
                auth_token,
                body,
            )
            .await
            .map_err(BillingError::database)?
            .ok_or(BillingError::NotFound)
    }

    async fn select_many(&self, filter: &str, auth_token: &str) -> Result<Vec<Invoice>, BillingError> {
        let path = format!("/rest/v1/invoices?{}", filter);
        debug!("Fetching invoices: {}", path);

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(BillingError::database)
    }
}
