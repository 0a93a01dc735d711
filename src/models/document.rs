use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    errors::ServiceError,
    models::{
        line_item::LineItem,
        status::{
            DocumentKind, DocumentStatus, FulfillmentStatus, InvoiceStatus, OrderSide,
            PaymentStatus,
        },
        validate_order_number,
    },
};

/// Header plus owned line items. Sales and purchase orders share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    /// Unique and immutable once assigned.
    pub order_number: String,
    pub kind: DocumentKind,
    /// Customer on the sales side, vendor on the purchase side.
    pub counterparty_id: Option<Uuid>,
    pub status: DocumentStatus,
    pub delivery_status: FulfillmentStatus,
    pub received_status: FulfillmentStatus,
    pub invoice_status: InvoiceStatus,
    pub payment_status: PaymentStatus,
    pub items: Vec<LineItem>,
    /// Document-level discount, absolute.
    pub discount: Decimal,
    pub total_amount: Decimal,
    /// Cumulative payments recorded against this document's invoices.
    pub paid_amount: Decimal,
    pub notes: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn side(&self) -> OrderSide {
        self.kind.side()
    }

    pub fn line(&self, line_id: Uuid) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id == line_id)
    }

    pub fn outstanding_amount(&self) -> Decimal {
        (self.total_amount - self.paid_amount).max(Decimal::ZERO)
    }

    pub fn statuses(&self) -> DocumentStatuses {
        DocumentStatuses {
            delivery_status: self.delivery_status,
            received_status: self.received_status,
            invoice_status: self.invoice_status,
            payment_status: self.payment_status,
        }
    }

    /// Line mutations are rejected once the document is cancelled or has
    /// reached its fulfilled status.
    pub fn ensure_lines_editable(&self) -> Result<(), ServiceError> {
        if self.status.is_terminal() || self.status == self.kind.fulfilled_status() {
            return Err(ServiceError::Conflict(format!(
                "Document {} is {} and its lines can no longer change",
                self.order_number, self.status
            )));
        }
        Ok(())
    }

    /// Applies a header update in place. The order number is not part of the
    /// update and never changes.
    pub fn apply_header(&mut self, update: &DocumentHeaderUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(discount) = update.discount {
            self.discount = discount;
        }
        if let Some(notes) = &update.notes {
            self.notes = notes.clone();
        }
        if let Some(counterparty_id) = update.counterparty_id {
            self.counterparty_id = Some(counterparty_id);
        }
        if let Some(derived) = &update.derived {
            self.total_amount = derived.total_amount;
            let statuses = derived.statuses;
            self.delivery_status = statuses.delivery_status;
            self.received_status = statuses.received_status;
            self.invoice_status = statuses.invoice_status;
            self.payment_status = statuses.payment_status;
        }
    }
}

/// The four independently derived status axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStatuses {
    pub delivery_status: FulfillmentStatus,
    pub received_status: FulfillmentStatus,
    pub invoice_status: InvoiceStatus,
    pub payment_status: PaymentStatus,
}

impl Default for DocumentStatuses {
    fn default() -> Self {
        Self {
            delivery_status: FulfillmentStatus::Pending,
            received_status: FulfillmentStatus::Pending,
            invoice_status: InvoiceStatus::NotInvoiced,
            payment_status: PaymentStatus::Unpaid,
        }
    }
}

/// Derived header fields. Only the crate's own recomputation can build one,
/// so callers have no path to set totals or derived statuses by hand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedHeader {
    total_amount: Decimal,
    statuses: DocumentStatuses,
}

impl DerivedHeader {
    pub(crate) fn new(total_amount: Decimal, statuses: DocumentStatuses) -> Self {
        Self {
            total_amount,
            statuses,
        }
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn statuses(&self) -> DocumentStatuses {
        self.statuses
    }
}

/// Header changes sent to the gateway. Callers outside the crate can set
/// the user-editable fields; the derived part is only filled in by the
/// service's own recomputation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentHeaderUpdate {
    pub status: Option<DocumentStatus>,
    pub discount: Option<Decimal>,
    pub notes: Option<Option<String>>,
    pub counterparty_id: Option<Uuid>,
    pub(crate) derived: Option<DerivedHeader>,
}

impl DocumentHeaderUpdate {
    pub fn status(status: DocumentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub(crate) fn derived(derived: DerivedHeader) -> Self {
        Self {
            derived: Some(derived),
            ..Default::default()
        }
    }

    /// Read access for gateway implementations that store totals and derived
    /// statuses in their own columns.
    pub fn derived_header(&self) -> Option<DerivedHeader> {
        self.derived
    }
}

/// Request to create an originating document.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewDocument {
    #[validate(custom = "validate_originating_kind")]
    pub kind: DocumentKind,
    /// Assigned by the gateway when absent.
    #[validate(custom = "validate_order_number_field")]
    pub order_number: Option<String>,
    pub counterparty_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    #[validate(custom = "validate_non_negative_amount")]
    pub discount: Decimal,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl NewDocument {
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            order_number: None,
            counterparty_id: None,
            items: Vec::new(),
            discount: Decimal::ZERO,
            notes: None,
        }
    }
}

fn validate_originating_kind(kind: &DocumentKind) -> Result<(), ValidationError> {
    if kind.is_originating() {
        Ok(())
    } else {
        let mut err = ValidationError::new("kind");
        err.message = Some("Only sales and purchase orders can be created directly".into());
        Err(err)
    }
}

fn validate_order_number_field(order_number: &str) -> Result<(), ValidationError> {
    validate_order_number(order_number).map_err(|msg| {
        let mut err = ValidationError::new("order_number");
        err.message = Some(msg.into());
        err
    })
}

pub(crate) fn validate_non_negative_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount < Decimal::ZERO {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("Amount cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Filter for document lists. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentFilter {
    pub kind: Option<DocumentKind>,
    pub status: Option<DocumentStatus>,
    pub counterparty_id: Option<Uuid>,
    pub number_prefix: Option<String>,
}

impl DocumentFilter {
    pub fn kind(kind: DocumentKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.kind.map_or(true, |kind| document.kind == kind)
            && self.status.map_or(true, |status| document.status == status)
            && self
                .counterparty_id
                .map_or(true, |id| document.counterparty_id == Some(id))
            && self
                .number_prefix
                .as_deref()
                .map_or(true, |prefix| document.order_number.starts_with(prefix))
    }
}
