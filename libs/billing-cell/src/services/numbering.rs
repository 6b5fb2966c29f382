/// `INV-<unix millis>-<sequence>`, the sequence zero-padded to four digits.
pub fn invoice_number(unix_millis: i64, sequence: u64) -> String {
    format!("INV-{}-{:04}", unix_millis, sequence)
}
