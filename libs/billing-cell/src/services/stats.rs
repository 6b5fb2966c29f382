use std::collections::BTreeMap;

use crate::models::{InvoiceAmountRow, InvoiceStats, InvoiceStatus, StatusSummary};
use crate::services::totals::round_cents;

/// Per-status counts and amounts over active invoices, plus revenue from paid ones.
pub fn summarize(rows: &[InvoiceAmountRow]) -> InvoiceStats {
    let mut by_status: BTreeMap<InvoiceStatus, (u64, f64)> = BTreeMap::new();
    for row in rows {
        let entry = by_status.entry(row.status).or_default();
        entry.0 += 1;
        entry.1 += row.amount;
    }

    let total_revenue = by_status
        .get(&InvoiceStatus::Paid)
        .map(|(_, amount)| round_cents(*amount))
        .unwrap_or(0.0);

    InvoiceStats {
        stats: by_status
            .into_iter()
            .map(|(status, (count, amount))| StatusSummary {
                status,
                count,
                total_amount: round_cents(amount),
            })
            .collect(),
        total_invoices: rows.len() as u64,
        total_revenue,
    }
}
