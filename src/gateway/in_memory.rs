use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::ServiceError,
    gateway::PersistenceGateway,
    models::{
        format_order_number, DependentDocument, DependentDocumentRequest, DependentKind,
        DependentLine, Document, DocumentFilter, DocumentHeaderUpdate, DocumentStatus,
        DocumentStatuses, LineItem, NewDocument, OrderSide,
    },
    services::totals::ensure_totals_in_range,
};

/// Process-local store that honours the gateway contract.
///
/// Every mutation of a document or of a dependent record belonging to it
/// happens while the parent document's entry is held mutably, so increments
/// and reversals on one parent are serialised. Locks are always taken in the
/// order documents, then dependents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    documents: Arc<DashMap<Uuid, Document>>,
    dependents: Arc<DashMap<Uuid, DependentDocument>>,
    numbers: Arc<DashMap<String, Uuid>>,
    sequences: Arc<DashMap<String, u64>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    fn dependent_snapshot(&self, id: Uuid) -> Result<DependentDocument, ServiceError> {
        self.dependents
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("Dependent document {} not found", id)))
    }

    fn claim_number(&self, number: &str, owner: Uuid) -> Result<(), ServiceError> {
        match self.numbers.entry(number.to_string()) {
            Entry::Occupied(_) => Err(ServiceError::Conflict(format!(
                "Order number {} is already in use",
                number
            ))),
            Entry::Vacant(slot) => {
                slot.insert(owner);
                Ok(())
            }
        }
    }

    /// Next free `{PREFIX}-{YYYYMMDD}-{SEQ}` for today. Numbers supplied by
    /// callers may already occupy a sequence slot, so taken ones are skipped.
    fn assign_number(&self, prefix: &str, owner: Uuid) -> String {
        let date = Utc::now().date_naive();
        let key = format!("{}-{}", prefix, date.format("%Y%m%d"));
        loop {
            let sequence = {
                let mut counter = self.sequences.entry(key.clone()).or_insert(0);
                *counter += 1;
                *counter
            };
            let number = format_order_number(prefix, date, sequence);
            if self.claim_number(&number, owner).is_ok() {
                return number;
            }
        }
    }
}

fn validate_items(items: &[LineItem], side: OrderSide) -> Result<(), ServiceError> {
    for item in items {
        item.validate_amounts()?;
        item.check_fulfilment_invariants(side)?;
    }
    ensure_totals_in_range(items)
}

fn touch(document: &mut Document) {
    document.version += 1;
    document.updated_at = Utc::now();
}

/// Adds `sign * quantity` to the cumulative field `kind` drives, for every
/// dependent line, then checks the fulfilment invariants on the result.
fn apply_line_quantities(
    items: &[LineItem],
    side: OrderSide,
    kind: DependentKind,
    lines: &[DependentLine],
    sign: Decimal,
) -> Result<Vec<LineItem>, ServiceError> {
    let mut updated = items.to_vec();
    for dependent_line in lines {
        let item = updated
            .iter_mut()
            .find(|item| item.id == dependent_line.source_line_id)
            .ok_or_else(|| ServiceError::line_not_found(dependent_line.source_line_id))?;
        let cumulative = match kind {
            DependentKind::Delivery => &mut item.delivered_quantity,
            DependentKind::Receipt => &mut item.received_quantity,
            DependentKind::Invoice => &mut item.invoiced_quantity,
            DependentKind::Payment => continue,
        };
        let next = dependent_line
            .quantity
            .checked_mul(sign)
            .and_then(|delta| cumulative.checked_add(delta))
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Quantity {} on line {} is out of range",
                    dependent_line.quantity, dependent_line.source_line_id
                ))
            })?;
        *cumulative = next;
        if item.fulfilled_quantity(side) < Decimal::ZERO || item.invoiced_quantity < Decimal::ZERO {
            return Err(ServiceError::Conflict(format!(
                "Line {} cumulative quantity would go negative",
                item.id
            )));
        }
    }
    for item in &updated {
        item.check_fulfilment_invariants(side)?;
    }
    Ok(updated)
}

fn validate_request(request: &DependentDocumentRequest) -> Result<(), ServiceError> {
    if request.kind.carries_lines() && request.lines.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "A {} needs at least one line",
            request.kind
        )));
    }
    if let Some(line) = request.lines.iter().find(|line| line.quantity <= Decimal::ZERO) {
        return Err(ServiceError::ValidationError(format!(
            "Quantity for line {} must be greater than zero",
            line.source_line_id
        )));
    }
    if request.amount < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Amount cannot be negative".into(),
        ));
    }
    if request.kind == DependentKind::Payment {
        if request.invoice_id.is_none() {
            return Err(ServiceError::ValidationError(
                "A payment must reference an invoice".into(),
            ));
        }
        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Payment amount must be greater than zero".into(),
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn fetch_document(&self, id: Uuid) -> Result<Document, ServiceError> {
        self.documents
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::document_not_found(id))
    }

    async fn fetch_document_list(
        &self,
        filter: DocumentFilter,
    ) -> Result<Vec<Document>, ServiceError> {
        let mut documents: Vec<Document> = self
            .documents
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        documents.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.order_number.cmp(&b.order_number))
        });
        Ok(documents)
    }

    #[instrument(skip(self, document), fields(kind = %document.kind))]
    async fn create_document(&self, document: NewDocument) -> Result<Document, ServiceError> {
        document.validate()?;
        let side = document.kind.side();
        validate_items(&document.items, side)?;

        let id = Uuid::new_v4();
        let order_number = match document.order_number {
            Some(number) => {
                self.claim_number(&number, id)?;
                number
            }
            None => self.assign_number(document.kind.number_prefix(), id),
        };

        let now = Utc::now();
        let statuses = DocumentStatuses::default();
        let created = Document {
            id,
            order_number,
            kind: document.kind,
            counterparty_id: document.counterparty_id,
            status: DocumentStatus::Draft,
            delivery_status: statuses.delivery_status,
            received_status: statuses.received_status,
            invoice_status: statuses.invoice_status,
            payment_status: statuses.payment_status,
            items: document.items,
            discount: document.discount,
            total_amount: Decimal::ZERO,
            paid_amount: Decimal::ZERO,
            notes: document.notes,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.documents.insert(id, created.clone());
        debug!(document_id = %id, order_number = %created.order_number, "document stored");
        Ok(created)
    }

    async fn replace_document_items(
        &self,
        document_id: Uuid,
        items: Vec<LineItem>,
    ) -> Result<(), ServiceError> {
        let mut document = self
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| ServiceError::document_not_found(document_id))?;
        validate_items(&items, document.side())?;
        document.items = items;
        touch(&mut document);
        Ok(())
    }

    async fn update_document_header(
        &self,
        id: Uuid,
        update: DocumentHeaderUpdate,
    ) -> Result<Document, ServiceError> {
        if matches!(update.discount, Some(discount) if discount < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Discount cannot be negative".into(),
            ));
        }
        let mut document = self
            .documents
            .get_mut(&id)
            .ok_or_else(|| ServiceError::document_not_found(id))?;
        document.apply_header(&update);
        touch(&mut document);
        Ok(document.clone())
    }

    #[instrument(skip(self, request), fields(kind = %request.kind, parent = %request.parent_document_id))]
    async fn record_dependent_document(
        &self,
        request: DependentDocumentRequest,
    ) -> Result<DependentDocument, ServiceError> {
        validate_request(&request)?;

        let mut parent = self
            .documents
            .get_mut(&request.parent_document_id)
            .ok_or_else(|| ServiceError::document_not_found(request.parent_document_id))?;
        if !parent.kind.is_originating() {
            return Err(ServiceError::InvalidOperation(format!(
                "{} cannot carry dependent documents",
                parent.kind
            )));
        }
        let side = parent.side();
        if let Some(required) = request.kind.required_side() {
            if required != side {
                return Err(ServiceError::InvalidOperation(format!(
                    "A {} cannot be recorded against a {}",
                    request.kind, parent.kind
                )));
            }
        }

        let items = apply_line_quantities(
            &parent.items,
            side,
            request.kind,
            &request.lines,
            Decimal::ONE,
        )?;

        if request.kind == DependentKind::Payment {
            let invoice_id = request.invoice_id.ok_or_else(|| {
                ServiceError::ValidationError("A payment must reference an invoice".into())
            })?;
            let invoice = self
                .dependents
                .get(&invoice_id)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| ServiceError::NotFound(format!("Invoice {} not found", invoice_id)))?;
            if invoice.kind != DependentKind::Invoice
                || invoice.parent_document_id != parent.id
                || !invoice.is_active()
            {
                return Err(ServiceError::InvalidOperation(format!(
                    "{} is not an open invoice of {}",
                    invoice.number, parent.order_number
                )));
            }
            if request.amount > invoice.unpaid_amount() {
                return Err(ServiceError::Conflict(format!(
                    "Payment {} exceeds the unpaid {} on invoice {}",
                    request.amount,
                    invoice.unpaid_amount(),
                    invoice.number
                )));
            }
            if request.amount > parent.outstanding_amount() {
                return Err(ServiceError::Conflict(format!(
                    "Payment {} exceeds the outstanding {} on {}",
                    request.amount,
                    parent.outstanding_amount(),
                    parent.order_number
                )));
            }
            if let Some(mut invoice) = self.dependents.get_mut(&invoice_id) {
                invoice.paid_amount += request.amount;
            }
            parent.paid_amount += request.amount;
        }

        let id = Uuid::new_v4();
        let number = self.assign_number(request.kind.number_prefix(), id);
        let recorded = DependentDocument {
            id,
            number,
            kind: request.kind,
            parent_document_id: parent.id,
            lines: request.lines,
            invoice_id: request.invoice_id,
            amount: request.amount,
            paid_amount: Decimal::ZERO,
            reference: request.reference,
            reversed: false,
            created_at: Utc::now(),
        };

        parent.items = items;
        touch(&mut parent);
        self.dependents.insert(id, recorded.clone());
        debug!(dependent_id = %id, number = %recorded.number, "dependent document stored");
        Ok(recorded)
    }

    async fn fetch_dependent_document(&self, id: Uuid) -> Result<DependentDocument, ServiceError> {
        self.dependent_snapshot(id)
    }

    async fn fetch_dependent_documents(
        &self,
        parent_document_id: Uuid,
    ) -> Result<Vec<DependentDocument>, ServiceError> {
        let mut dependents: Vec<DependentDocument> = self
            .dependents
            .iter()
            .filter(|entry| entry.parent_document_id == parent_document_id)
            .map(|entry| entry.value().clone())
            .collect();
        dependents.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.number.cmp(&b.number))
        });
        Ok(dependents)
    }

    #[instrument(skip(self))]
    async fn reverse_dependent_document(
        &self,
        id: Uuid,
    ) -> Result<DependentDocument, ServiceError> {
        let parent_id = self.dependent_snapshot(id)?.parent_document_id;
        let mut parent = self
            .documents
            .get_mut(&parent_id)
            .ok_or_else(|| ServiceError::document_not_found(parent_id))?;

        // re-read under the parent lock
        let dependent = self.dependent_snapshot(id)?;
        if dependent.reversed {
            return Err(ServiceError::Conflict(format!(
                "{} has already been reversed",
                dependent.number
            )));
        }

        let side = parent.side();
        match dependent.kind {
            DependentKind::Delivery | DependentKind::Receipt | DependentKind::Invoice => {
                if dependent.kind == DependentKind::Invoice && dependent.paid_amount > Decimal::ZERO {
                    return Err(ServiceError::Conflict(format!(
                        "Invoice {} has payments recorded; reverse them first",
                        dependent.number
                    )));
                }
                let items = apply_line_quantities(
                    &parent.items,
                    side,
                    dependent.kind,
                    &dependent.lines,
                    Decimal::NEGATIVE_ONE,
                )?;
                parent.items = items;
            }
            DependentKind::Payment => {
                if let Some(invoice_id) = dependent.invoice_id {
                    if let Some(mut invoice) = self.dependents.get_mut(&invoice_id) {
                        invoice.paid_amount =
                            (invoice.paid_amount - dependent.amount).max(Decimal::ZERO);
                    }
                }
                parent.paid_amount = (parent.paid_amount - dependent.amount).max(Decimal::ZERO);
            }
        }

        let reversed = match self.dependents.get_mut(&id) {
            Some(mut entry) => {
                entry.reversed = true;
                entry.value().clone()
            }
            None => {
                warn!(dependent_id = %id, "dependent vanished during reversal");
                return Err(ServiceError::NotFound(format!(
                    "Dependent document {} not found",
                    id
                )));
            }
        };
        touch(&mut parent);
        Ok(reversed)
    }
}
