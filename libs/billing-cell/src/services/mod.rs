pub mod invoice;
pub mod numbering;
pub mod stats;
pub mod totals;

pub use invoice::InvoiceService;
pub use numbering::invoice_number;
pub use stats::summarize;
pub use totals::{price_items, round_cents, InvoiceTotals};
