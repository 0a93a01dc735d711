//! Derives the delivery, receipt, invoice and payment axes from cumulative
//! line quantities and gates the follow-up actions on them.
//!
//! Everything here is a pure function of the document passed in. Gates are
//! recomputed from line data on every call and never read the stored status
//! fields, which may be stale.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    errors::ServiceError,
    models::{
        DependentKind, DerivedHeader, Document, DocumentStatus, DocumentStatuses,
        FulfillmentStatus, InvoiceStatus, LineItem, OrderSide, PaymentStatus,
    },
    services::totals::document_totals,
};

/// `Pending` when nothing is fulfilled (including an empty document),
/// `Completed` when every line is fully fulfilled, `Partial` otherwise.
pub fn derive_fulfilment_status(items: &[LineItem], side: OrderSide) -> FulfillmentStatus {
    if items
        .iter()
        .all(|line| line.fulfilled_quantity(side) <= Decimal::ZERO)
    {
        FulfillmentStatus::Pending
    } else if items
        .iter()
        .all(|line| line.fulfilled_quantity(side) >= line.quantity)
    {
        FulfillmentStatus::Completed
    } else {
        FulfillmentStatus::Partial
    }
}

/// Invoiced quantity against fulfilled quantity, line by line.
pub fn derive_invoice_status(items: &[LineItem], side: OrderSide) -> InvoiceStatus {
    if items
        .iter()
        .all(|line| line.invoiced_quantity <= Decimal::ZERO)
    {
        InvoiceStatus::NotInvoiced
    } else if items
        .iter()
        .all(|line| line.invoiced_quantity >= line.fulfilled_quantity(side))
    {
        InvoiceStatus::FullyInvoiced
    } else {
        InvoiceStatus::Partial
    }
}

pub fn derive_payment_status(paid_amount: Decimal, total_amount: Decimal) -> PaymentStatus {
    if paid_amount <= Decimal::ZERO {
        PaymentStatus::Unpaid
    } else if paid_amount >= total_amount {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    }
}

pub fn derive_statuses(document: &Document) -> DocumentStatuses {
    let total_amount = document_totals(document).grand_total;
    DocumentStatuses {
        delivery_status: derive_fulfilment_status(&document.items, OrderSide::Sales),
        received_status: derive_fulfilment_status(&document.items, OrderSide::Purchase),
        invoice_status: derive_invoice_status(&document.items, document.side()),
        payment_status: derive_payment_status(document.paid_amount, total_amount),
    }
}

/// Fresh totals and statuses for the header.
pub fn derive_header(document: &Document) -> DerivedHeader {
    DerivedHeader::new(
        document_totals(document).grand_total,
        derive_statuses(document),
    )
}

/// Overwrites the derived header fields from the current lines and returns
/// whether anything changed. Cancelled documents are frozen and left as is.
pub fn refresh_derived(document: &mut Document) -> bool {
    if document.status.is_terminal() {
        return false;
    }
    let derived = derive_header(document);
    let changed = document.total_amount != derived.total_amount()
        || document.statuses() != derived.statuses();
    if changed {
        document.total_amount = derived.total_amount();
        let statuses = derived.statuses();
        document.delivery_status = statuses.delivery_status;
        document.received_status = statuses.received_status;
        document.invoice_status = statuses.invoice_status;
        document.payment_status = statuses.payment_status;
    }
    changed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentAction {
    CreateDelivery,
    ReceiveGoods,
    CreateInvoice,
    RecordPayment,
}

impl From<DependentKind> for DocumentAction {
    fn from(kind: DependentKind) -> Self {
        match kind {
            DependentKind::Delivery => DocumentAction::CreateDelivery,
            DependentKind::Receipt => DocumentAction::ReceiveGoods,
            DependentKind::Invoice => DocumentAction::CreateInvoice,
            DependentKind::Payment => DocumentAction::RecordPayment,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableActions {
    pub create_delivery: bool,
    pub receive_goods: bool,
    pub create_invoice: bool,
    pub record_payment: bool,
}

impl AvailableActions {
    pub fn allows(&self, action: DocumentAction) -> bool {
        match action {
            DocumentAction::CreateDelivery => self.create_delivery,
            DocumentAction::ReceiveGoods => self.receive_goods,
            DocumentAction::CreateInvoice => self.create_invoice,
            DocumentAction::RecordPayment => self.record_payment,
        }
    }
}

pub fn available_actions(document: &Document) -> AvailableActions {
    if document.status == DocumentStatus::Cancelled || !document.kind.is_originating() {
        return AvailableActions::default();
    }

    let statuses = derive_statuses(document);
    let side = document.side();
    let fulfilment = match side {
        OrderSide::Sales => statuses.delivery_status,
        OrderSide::Purchase => statuses.received_status,
    };

    AvailableActions {
        create_delivery: side == OrderSide::Sales
            && document.status == DocumentStatus::Confirmed
            && statuses.delivery_status != FulfillmentStatus::Completed,
        receive_goods: side == OrderSide::Purchase
            && document.status == DocumentStatus::Ordered
            && statuses.received_status != FulfillmentStatus::Completed,
        create_invoice: fulfilment != FulfillmentStatus::Pending
            && statuses.invoice_status != InvoiceStatus::FullyInvoiced,
        record_payment: statuses.invoice_status != InvoiceStatus::NotInvoiced
            && statuses.payment_status != PaymentStatus::Paid,
    }
}

pub fn ensure_action_allowed(
    document: &Document,
    action: DocumentAction,
) -> Result<(), ServiceError> {
    if available_actions(document).allows(action) {
        Ok(())
    } else {
        Err(ServiceError::InvalidOperation(format!(
            "Action {} is not available for {} {} (status {})",
            action, document.kind, document.order_number, document.status
        )))
    }
}
