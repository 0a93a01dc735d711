pub mod dependent;
pub mod document;
pub mod line_item;
pub mod status;

pub use dependent::{DependentDocument, DependentDocumentRequest, DependentKind, DependentLine};
pub use document::{
    DerivedHeader, Document, DocumentFilter, DocumentHeaderUpdate, DocumentStatuses, NewDocument,
};
pub use line_item::LineItem;
pub use status::{
    DocumentKind, DocumentStatus, FulfillmentStatus, InvoiceStatus, LineBadge, OrderSide,
    PaymentStatus,
};

const MAX_ORDER_NUMBER_LEN: usize = 50;

/// Order numbers are non-empty, at most 50 characters, and limited to
/// alphanumerics, `-` and `_`.
pub fn validate_order_number(order_number: &str) -> Result<(), &'static str> {
    if order_number.is_empty() {
        return Err("Order number cannot be empty");
    }
    if order_number.len() > MAX_ORDER_NUMBER_LEN {
        return Err("Order number too long");
    }
    if !order_number
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Invalid characters in order number");
    }
    Ok(())
}

/// Formats `{PREFIX}-{YYYYMMDD}-{SEQ:04}`.
pub fn format_order_number(prefix: &str, date: chrono::NaiveDate, sequence: u64) -> String {
    format!("{}-{}-{:04}", prefix, date.format("%Y%m%d"), sequence)
}
