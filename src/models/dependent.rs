use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::status::{DocumentKind, OrderSide};

/// Documents recorded against an originating document's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DependentKind {
    Delivery,
    Invoice,
    Receipt,
    Payment,
}

impl DependentKind {
    pub fn document_kind(&self) -> Option<DocumentKind> {
        match self {
            DependentKind::Delivery => Some(DocumentKind::DeliveryOrder),
            DependentKind::Invoice => Some(DocumentKind::Invoice),
            DependentKind::Receipt => Some(DocumentKind::PurchaseReceipt),
            DependentKind::Payment => None,
        }
    }

    pub fn number_prefix(&self) -> &'static str {
        self.document_kind()
            .map(|kind| kind.number_prefix())
            .unwrap_or("PAY")
    }

    /// The side a fulfilment kind belongs to. Invoices and payments exist on
    /// both sides.
    pub fn required_side(&self) -> Option<OrderSide> {
        match self {
            DependentKind::Delivery => Some(OrderSide::Sales),
            DependentKind::Receipt => Some(OrderSide::Purchase),
            DependentKind::Invoice | DependentKind::Payment => None,
        }
    }

    pub fn carries_lines(&self) -> bool {
        !matches!(self, DependentKind::Payment)
    }
}

/// A quantity recorded against one originating line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependentLine {
    /// Non-owning back-reference to the originating line item.
    pub source_line_id: Uuid,
    pub quantity: Decimal,
}

impl DependentLine {
    pub fn new(source_line_id: Uuid, quantity: Decimal) -> Self {
        Self {
            source_line_id,
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependentDocumentRequest {
    pub kind: DependentKind,
    pub parent_document_id: Uuid,
    #[serde(default)]
    pub lines: Vec<DependentLine>,
    /// Invoice a payment is applied to.
    pub invoice_id: Option<Uuid>,
    /// Invoice amount or payment amount. Zero for deliveries and receipts.
    #[serde(default)]
    pub amount: Decimal,
    pub reference: Option<String>,
}

impl DependentDocumentRequest {
    fn with_lines(kind: DependentKind, parent_document_id: Uuid, lines: Vec<DependentLine>) -> Self {
        Self {
            kind,
            parent_document_id,
            lines,
            invoice_id: None,
            amount: Decimal::ZERO,
            reference: None,
        }
    }

    pub fn delivery(parent_document_id: Uuid, lines: Vec<DependentLine>) -> Self {
        Self::with_lines(DependentKind::Delivery, parent_document_id, lines)
    }

    pub fn receipt(parent_document_id: Uuid, lines: Vec<DependentLine>) -> Self {
        Self::with_lines(DependentKind::Receipt, parent_document_id, lines)
    }

    pub fn invoice(parent_document_id: Uuid, lines: Vec<DependentLine>, amount: Decimal) -> Self {
        Self {
            amount,
            ..Self::with_lines(DependentKind::Invoice, parent_document_id, lines)
        }
    }

    pub fn payment(parent_document_id: Uuid, invoice_id: Uuid, amount: Decimal) -> Self {
        Self {
            invoice_id: Some(invoice_id),
            amount,
            ..Self::with_lines(DependentKind::Payment, parent_document_id, Vec::new())
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependentDocument {
    pub id: Uuid,
    pub number: String,
    pub kind: DependentKind,
    pub parent_document_id: Uuid,
    pub lines: Vec<DependentLine>,
    pub invoice_id: Option<Uuid>,
    pub amount: Decimal,
    /// Payments applied so far. Only meaningful for invoices.
    pub paid_amount: Decimal,
    pub reference: Option<String>,
    pub reversed: bool,
    pub created_at: DateTime<Utc>,
}

impl DependentDocument {
    pub fn unpaid_amount(&self) -> Decimal {
        (self.amount - self.paid_amount).max(Decimal::ZERO)
    }

    pub fn is_active(&self) -> bool {
        !self.reversed
    }
}
