use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which side of the ledger a document belongs to. Sales documents fulfil
/// through deliveries, purchase documents through receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderSide {
    Sales,
    Purchase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentKind {
    SalesOrder,
    PurchaseOrder,
    DeliveryOrder,
    Invoice,
    PurchaseReceipt,
}

impl DocumentKind {
    pub fn number_prefix(&self) -> &'static str {
        match self {
            DocumentKind::SalesOrder => "SO",
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::DeliveryOrder => "DO",
            DocumentKind::Invoice => "INV",
            DocumentKind::PurchaseReceipt => "GR",
        }
    }

    /// Originating documents own editable line items. The others are
    /// recorded against them as dependent documents.
    pub fn is_originating(&self) -> bool {
        matches!(self, DocumentKind::SalesOrder | DocumentKind::PurchaseOrder)
    }

    pub fn side(&self) -> OrderSide {
        match self {
            DocumentKind::PurchaseOrder | DocumentKind::PurchaseReceipt => OrderSide::Purchase,
            _ => OrderSide::Sales,
        }
    }

    /// The status an originating document moves to when the user confirms it.
    pub fn confirmed_status(&self) -> DocumentStatus {
        match self.side() {
            OrderSide::Sales => DocumentStatus::Confirmed,
            OrderSide::Purchase => DocumentStatus::Ordered,
        }
    }

    /// The status an originating document moves to once fully fulfilled.
    pub fn fulfilled_status(&self) -> DocumentStatus {
        match self.side() {
            OrderSide::Sales => DocumentStatus::Delivered,
            OrderSide::Purchase => DocumentStatus::Received,
        }
    }
}

/// Lifecycle status. The only axis set by direct user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Confirmed,
    Ordered,
    Delivered,
    Received,
    Cancelled,
}

impl DocumentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Cancelled)
    }

    /// Whether the user may move a document of `kind` from `self` to `to`.
    pub fn can_transition_to(&self, kind: DocumentKind, to: DocumentStatus) -> bool {
        use DocumentStatus::*;
        match (kind.side(), *self, to) {
            (_, from, to) if from == to => true,

            (OrderSide::Sales, Draft, Confirmed) => true,
            (OrderSide::Sales, Draft, Cancelled) => true,
            (OrderSide::Sales, Confirmed, Delivered) => true,
            (OrderSide::Sales, Confirmed, Cancelled) => true,

            (OrderSide::Purchase, Draft, Ordered) => true,
            (OrderSide::Purchase, Draft, Cancelled) => true,
            (OrderSide::Purchase, Ordered, Received) => true,
            (OrderSide::Purchase, Ordered, Cancelled) => true,

            _ => false,
        }
    }
}

/// Delivery (sales) or receipt (purchase) progress across all lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FulfillmentStatus {
    Pending,
    Partial,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvoiceStatus {
    NotInvoiced,
    Partial,
    FullyInvoiced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

/// Per-line badge derived from the fulfilment ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LineBadge {
    None,
    Partial,
    Complete,
}
